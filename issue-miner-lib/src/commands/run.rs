//! Command dispatch logic for issue-miner

use super::{
    ClassifyArgs, CrawlArgs, GlossaryArgs, InitArgs, LinkArgs, MetricsArgs, PipelineArgs, PullsArgs, ReposArgs, SampleArgs,
    extract_glossary, init_config, process_classify, process_crawl, process_link, process_metrics, process_pipeline,
    process_pulls, process_repos, process_sample,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use std::io::Write;

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "issue-miner", version, author, long_about = None)]
#[command(about = "Mine ML and non-ML issues from hosted repositories into a balanced dataset")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: MinerSubcommand,
}

#[derive(Subcommand, Debug)]
enum MinerSubcommand {
    /// Select candidate repositories from a metadata feed
    Repos(ReposArgs),
    /// Store the issues and timelines of the selected repositories
    Crawl(CrawlArgs),
    /// Link issues to the pull requests that cross-reference them
    Link(LinkArgs),
    /// Find eligible issues and store their merged pull requests' changed files
    Pulls(PullsArgs),
    /// Label eligible issues as ml or non-ml
    Classify(ClassifyArgs),
    /// Draw a per-project balanced ml/non-ml set
    Sample(SampleArgs),
    /// Compute line change and fix duration for the sampled issues
    Metrics(MetricsArgs),
    /// Run every stage, from repository selection to the final dataset
    Pipeline(PipelineArgs),
    /// Extract a keyword list from a saved ML glossary page
    Glossary(GlossaryArgs),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// A failing command has its error written to the host's error stream, after
/// which the host is asked to exit with status 1.
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);

    let result = match &cli.command {
        MinerSubcommand::Repos(args) => process_repos(host, args).await,
        MinerSubcommand::Crawl(args) => process_crawl(host, args).await,
        MinerSubcommand::Link(args) => process_link(host, args).await,
        MinerSubcommand::Pulls(args) => process_pulls(host, args).await,
        MinerSubcommand::Classify(args) => process_classify(host, args).await,
        MinerSubcommand::Sample(args) => process_sample(host, args).await,
        MinerSubcommand::Metrics(args) => process_metrics(host, args).await,
        MinerSubcommand::Pipeline(args) => process_pipeline(host, args).await,
        MinerSubcommand::Glossary(args) => extract_glossary(host, args),
        MinerSubcommand::Init(args) => init_config(host, args),
    };

    if let Err(e) = &result {
        let _ = writeln!(host.error(), "error: {e}");
        host.exit(1);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;
    use camino::Utf8PathBuf;

    fn temp_data_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_cli_parses_every_subcommand() {
        for command in ["crawl", "link", "pulls", "classify", "sample", "metrics"] {
            let _ = Cli::try_parse_from(["issue-miner", command, "--data-dir", "out", "--restart"]).unwrap();
        }

        let cli = Cli::try_parse_from(["issue-miner", "repos", "--feed", "feed.csv", "--log-level", "info"]).unwrap();
        let MinerSubcommand::Repos(args) = cli.command else {
            panic!("expected repos");
        };
        assert_eq!(args.feed, Utf8PathBuf::from("feed.csv"));

        let _ = Cli::try_parse_from(["issue-miner", "pipeline", "--feed", "feed.csv"]).unwrap();
        let _ = Cli::try_parse_from(["issue-miner", "glossary", "page.html", "-o", "keywords.txt"]).unwrap();
        let _ = Cli::try_parse_from(["issue-miner", "init"]).unwrap();
        let _ = Cli::try_parse_from(["issue-miner", "repos"]).unwrap_err();
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call mkdtemp")]
    async fn test_missing_prerequisite_exits_with_one() {
        let (_dir, data_dir) = temp_data_dir();
        let mut host = TestHost::new();

        let result = run(&mut host, ["issue-miner", "sample", "--data-dir", data_dir.as_str()]).await;

        let _ = result.unwrap_err();
        assert_eq!(host.exit_code, Some(1));
        let error = host.error_text();
        assert!(error.contains("prerequisite missing"), "{error}");
        assert!(error.contains("classified_issues.csv"), "{error}");
        assert!(error.contains("issue-miner classify"), "{error}");
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call mkdtemp")]
    async fn test_sample_reports_counts() {
        let (_dir, data_dir) = temp_data_dir();
        let text = "Project Name,Issue URL,Issue Number,Closed PRs,Title,Framework Import,Matched Module,Keyword,Category\n\
                    foo/bar,https://github.com/foo/bar/issues/1,1,2,Loss is NaN,true,torch,loss,ml\n\
                    foo/bar,https://github.com/foo/bar/issues/3,3,4,Typo in README,false,,,non-ml\n\
                    foo/bar,https://github.com/foo/bar/issues/5,5,6,Fix CI,false,,,non-ml\n\
                    foo/baz,https://github.com/foo/baz/issues/1,1,2,Bad gradient,true,keras,gradient,ml\n";
        std::fs::write(data_dir.join("classified_issues.csv"), text).unwrap();
        std::fs::write(data_dir.join("miner.toml"), "[sample]\nseed = 1\n").unwrap();

        let mut host = TestHost::new();
        run(&mut host, ["issue-miner", "sample", "--data-dir", data_dir.as_str()]).await.unwrap();

        let output = host.output_text();
        assert!(output.starts_with("sampled 2 issue(s) from 1 project(s), 1 excluded\n"), "{output}");
        assert!(output.contains("  foo/bar: 1 ml\n"));
        assert!(output.contains("  excluded: foo/baz\n"));
        assert_eq!(host.exit_code, None);

        let sampled = std::fs::read_to_string(data_dir.join("sampled_issues.csv")).unwrap();
        assert_eq!(sampled.lines().count(), 3);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call mkdtemp")]
    async fn test_init_writes_config() {
        let (_dir, data_dir) = temp_data_dir();
        let mut host = TestHost::new();
        run(&mut host, ["issue-miner", "init", "--data-dir", data_dir.as_str()]).await.unwrap();
        assert!(data_dir.join("miner.toml").exists());
    }
}
