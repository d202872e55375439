use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::artifacts::{FeedRow, REPOSITORIES_CSV, read_rows, write_rows};
use crate::mining::{Status, TrackedItem};
use crate::mining::repo_filter::{RepositoryFilter, Selection, select};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ohno::bail;

const LOG_TARGET: &str = "     repos";

#[derive(Parser, Debug)]
pub struct ReposArgs {
    /// Bulk repository metadata feed (CSV with owner and repo columns)
    #[arg(long, value_name = "PATH")]
    pub feed: Utf8PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_repos<H: Host>(host: &mut H, args: &ReposArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common).await?;
    select_repositories(&mut common, &args.feed).await
}

/// Filter the feed down to the candidate repositories and write `repositories.csv`.
///
/// Rows before the checkpoint are decided from stored snapshots only.
pub async fn select_repositories<H: Host>(common: &mut Common<'_, H>, feed: &Utf8Path) -> Result<()> {
    if !feed.exists() {
        bail!("repository feed '{feed}' does not exist");
    }

    common.progress.begin("Reading", Box::new(|| Status::spinner("loading repository feed")));
    let rows: Vec<FeedRow> = read_rows(feed.as_std_path(), "repos")?;

    let filter = RepositoryFilter::new(common.config.filter.clone());
    let mut checkpoint = common.checkpoint("repos", rows.len())?;
    let tracker = common.tracker("Filtering");
    tracker.add(TrackedItem::Projects, rows.len() as u64);

    let total = rows.len();
    let mut accepted = Vec::new();
    let mut rejected = 0usize;
    let mut gone = 0usize;
    let mut failed = 0usize;

    for (index, row) in rows.iter().enumerate() {
        let online = index >= checkpoint.next_row();
        log::info!(target: LOG_TARGET, "Repository {}/{total}: {}/{}", index + 1, row.owner, row.repo);

        match select(&filter, &common.snapshots, row, online).await {
            Selection::Accepted(repository) => accepted.push(repository.to_row()),
            Selection::Rejected(_) => rejected += 1,
            Selection::Gone => gone += 1,
            Selection::Failed(e) => {
                log::warn!(target: LOG_TARGET, "Skipping {}/{}: {e:#}", row.owner, row.repo);
                failed += 1;
            }
        }

        tracker.complete(TrackedItem::Projects);

        // A failed row must be retried on the next run, so the cursor stops before it.
        if online && failed == 0 {
            checkpoint.advance(index + 1)?;
        }
    }

    tracker.finish();
    write_rows(&common.artifact(REPOSITORIES_CSV), &accepted)?;

    common.report(format_args!(
        "selected {} of {total} repositories: {rejected} rejected, {gone} gone, {failed} failed",
        accepted.len()
    ));
    Ok(())
}
