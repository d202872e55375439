use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::artifacts::{REPOSITORIES_CSV, RepositoryRow, read_rows};
use crate::mining::{CrawlStats, IssuePRCrawler, ProjectId, TrackedItem};
use clap::Parser;
use futures_util::future::join_all;

const LOG_TARGET: &str = "     crawl";

#[derive(Parser, Debug)]
pub struct CrawlArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_crawl<H: Host>(host: &mut H, args: &CrawlArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common).await?;
    crawl_issues(&mut common).await
}

/// Store the issues and timelines of every selected repository.
///
/// Repositories are crawled in batches of `max_concurrent_repositories`; the
/// checkpoint moves past a batch once none of its requests failed.
pub async fn crawl_issues<H: Host>(common: &mut Common<'_, H>) -> Result<()> {
    let rows: Vec<RepositoryRow> = read_rows(&common.artifact(REPOSITORIES_CSV), "repos")?;
    let projects = rows.iter().map(RepositoryRow::project).collect::<Result<Vec<ProjectId>>>()?;

    let mut checkpoint = common.checkpoint("crawl", projects.len())?;
    let start = checkpoint.next_row();
    let pending = &projects[start..];

    let tracker = common.tracker("Crawling");
    tracker.add(TrackedItem::Projects, pending.len() as u64);
    let crawler = IssuePRCrawler::new(common.snapshots.clone(), tracker.clone(), &common.config.classify.source_extension);

    let total = projects.len();
    let mut stats = CrawlStats::default();
    let mut done = start;
    let mut clean = true;

    for batch in pending.chunks(common.concurrency()) {
        for (offset, project) in batch.iter().enumerate() {
            log::info!(target: LOG_TARGET, "Project {}/{total}: {project}", done + offset + 1);
        }

        for outcome in join_all(batch.iter().map(|project| crawler.crawl_issues(project))).await {
            clean &= outcome.failed == 0;
            stats += outcome;
            tracker.complete(TrackedItem::Projects);
        }

        done += batch.len();
        if clean {
            checkpoint.advance(done)?;
        }
    }

    tracker.finish();

    common.report(format_args!(
        "crawled {} project(s): {} issue(s) stored, {} missing, {} failed, {start} already done",
        stats.projects, stats.issues, stats.missing, stats.failed
    ));
    Ok(())
}
