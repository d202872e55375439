use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::artifacts::{ISSUE_PR_CSV, REPOSITORIES_CSV, RepositoryRow, read_rows, write_rows};
use crate::mining::TrackedItem;
use crate::mining::linker::link_project;
use clap::Parser;

const LOG_TARGET: &str = "      link";

#[derive(Parser, Debug)]
pub struct LinkArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_link<H: Host>(host: &mut H, args: &LinkArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common).await?;
    link_issues(&mut common).await
}

/// Build `issue_pr.csv` from the stored timelines. Runs offline.
pub async fn link_issues<H: Host>(common: &mut Common<'_, H>) -> Result<()> {
    let repositories: Vec<RepositoryRow> = read_rows(&common.artifact(REPOSITORIES_CSV), "repos")?;

    let tracker = common.tracker("Linking");
    tracker.add(TrackedItem::Projects, repositories.len() as u64);

    let total = repositories.len();
    let mut rows = Vec::new();
    let mut examined = 0;
    let mut skipped = 0;

    for (index, repository) in repositories.iter().enumerate() {
        let project = repository.project()?;
        log::info!(target: LOG_TARGET, "Project {}/{total}: {project}", index + 1);

        let links = link_project(&common.snapshots, &project).await?;
        examined += links.issues;
        skipped += links.skipped;
        rows.extend(links.rows);

        tracker.complete(TrackedItem::Projects);
    }

    tracker.finish();
    write_rows(&common.artifact(ISSUE_PR_CSV), &rows)?;

    common.report(format_args!(
        "linked {} of {examined} issue(s) to pull requests across {total} project(s), {skipped} skipped",
        rows.len()
    ));
    Ok(())
}
