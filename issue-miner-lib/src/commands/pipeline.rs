use super::Host;
use super::classify::classify_issues;
use super::common::{Common, CommonArgs};
use super::crawl::crawl_issues;
use super::link::link_issues;
use super::metrics::extract_metrics;
use super::pulls::crawl_pulls;
use super::repos::select_repositories;
use super::sample::sample_issues;
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;

#[derive(Parser, Debug)]
pub struct PipelineArgs {
    /// Bulk repository metadata feed (CSV with owner and repo columns)
    #[arg(long, value_name = "PATH")]
    pub feed: Utf8PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Run every stage in order, stopping at the first that fails.
pub async fn process_pipeline<H: Host>(host: &mut H, args: &PipelineArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common).await?;

    select_repositories(&mut common, &args.feed).await?;
    crawl_issues(&mut common).await?;
    link_issues(&mut common).await?;
    crawl_pulls(&mut common).await?;
    classify_issues(&mut common)?;
    sample_issues(&mut common)?;
    extract_metrics(&mut common).await
}
