use super::Host;
use super::common::{Common, CommonArgs, runs_by};
use crate::Result;
use crate::artifacts::{ELIGIBLE_CSV, EligibleRow, ISSUE_PR_CSV, LinkRow, read_rows, write_rows};
use crate::mining::eligibility::{Eligibility, check_issue};
use crate::mining::{CrawlStats, IssuePRCrawler, ProjectId, StageTracker, TrackedItem};
use clap::Parser;
use core::ops::Range;
use futures_util::future::join_all;

const LOG_TARGET: &str = "     pulls";

#[derive(Parser, Debug)]
pub struct PullsArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_pulls<H: Host>(host: &mut H, args: &PullsArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common).await?;
    crawl_pulls(&mut common).await
}

/// What one project's share of the link rows produced.
#[derive(Debug, Default)]
struct RunOutcome {
    eligible: Vec<EligibleRow>,
    not_eligible: usize,
    skipped: usize,
    failed: usize,
    stats: CrawlStats,
}

/// Check every linked issue for eligibility, then store the commits and source
/// files of each eligible issue's merged pull requests.
///
/// Rows before the checkpoint are re-checked from the store only, so the
/// eligible list is complete without repeating their downloads.
pub async fn crawl_pulls<H: Host>(common: &mut Common<'_, H>) -> Result<()> {
    let rows: Vec<LinkRow> = read_rows(&common.artifact(ISSUE_PR_CSV), "link")?;
    let projects = rows.iter().map(LinkRow::project).collect::<Result<Vec<ProjectId>>>()?;
    let runs = runs_by(&projects, Clone::clone);

    let mut checkpoint = common.checkpoint("pulls", rows.len())?;
    let resume_at = checkpoint.next_row();

    let tracker = common.tracker("Fetching");
    tracker.add(TrackedItem::Issues, rows.len() as u64);
    let crawler = IssuePRCrawler::new(common.snapshots.clone(), tracker.clone(), &common.config.classify.source_extension);

    let mut total = RunOutcome::default();
    let mut clean = true;

    for batch in runs.chunks(common.concurrency()) {
        let outcomes = join_all(
            batch
                .iter()
                .map(|run| process_run(&crawler, &tracker, &projects[run.start], &rows, run.clone(), resume_at)),
        )
        .await;

        for outcome in outcomes {
            clean &= outcome.failed == 0 && outcome.stats.failed == 0;
            total.eligible.extend(outcome.eligible);
            total.not_eligible += outcome.not_eligible;
            total.skipped += outcome.skipped;
            total.failed += outcome.failed;
            total.stats += outcome.stats;
        }

        let done = batch.last().map_or(0, |run| run.end);
        if clean && done > resume_at {
            checkpoint.advance(done)?;
        }
    }

    tracker.finish();
    write_rows(&common.artifact(ELIGIBLE_CSV), &total.eligible)?;

    common.report(format_args!(
        "{} eligible issue(s) of {}: {} not eligible, {} skipped, {} failed; stored {} pull request(s), {} file(s), {} missing, {} failed",
        total.eligible.len(),
        rows.len(),
        total.not_eligible,
        total.skipped,
        total.failed,
        total.stats.pulls,
        total.stats.files,
        total.stats.missing,
        total.stats.failed
    ));
    Ok(())
}

async fn process_run(
    crawler: &IssuePRCrawler,
    tracker: &StageTracker,
    project: &ProjectId,
    rows: &[LinkRow],
    run: Range<usize>,
    resume_at: usize,
) -> RunOutcome {
    let mut outcome = RunOutcome::default();
    let count = rows.len();

    for index in run {
        let row = &rows[index];
        let online = index >= resume_at;
        log::info!(target: LOG_TARGET, "Issue {}/{count}: {project} #{}", index + 1, row.issue_number);

        match check_issue(crawler, project, row, online).await {
            Eligibility::Eligible(eligible) => {
                if online {
                    tracker.add(TrackedItem::Pulls, eligible.merged_pulls.0.len() as u64);
                    for number in eligible.merged_pulls.iter() {
                        outcome.stats += crawler.crawl_pull_files(project, number).await;
                        tracker.complete(TrackedItem::Pulls);
                    }
                }
                outcome.eligible.push(eligible);
            }
            Eligibility::NotEligible => outcome.not_eligible += 1,
            Eligibility::Skipped => outcome.skipped += 1,
            Eligibility::Failed => outcome.failed += 1,
        }

        tracker.complete(TrackedItem::Issues);
    }

    outcome
}
