use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::artifacts::{DATASET_CSV, SAMPLED_CSV, SampledRow, read_rows, write_rows};
use crate::mining::metrics::{Extraction, rebalance};
use crate::mining::{MetricsExtractor, TrackedItem};
use clap::Parser;

const LOG_TARGET: &str = "   measure";

#[derive(Parser, Debug)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_metrics<H: Host>(host: &mut H, args: &MetricsArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common).await?;
    extract_metrics(&mut common).await
}

/// Measure every sampled issue and write the final `dataset.csv`.
///
/// Projects left unbalanced by dropped records are removed entirely.
pub async fn extract_metrics<H: Host>(common: &mut Common<'_, H>) -> Result<()> {
    let rows: Vec<SampledRow> = read_rows(&common.artifact(SAMPLED_CSV), "sample")?;

    let extractor = MetricsExtractor::new(common.snapshots.clone());
    let tracker = common.tracker("Measuring");
    tracker.add(TrackedItem::Issues, rows.len() as u64);

    let total = rows.len();
    let mut records = Vec::with_capacity(total);
    let mut dropped = 0;

    for (index, row) in rows.iter().enumerate() {
        log::info!(target: LOG_TARGET, "Issue {}/{total}: {} #{}", index + 1, row.project, row.issue_number);

        match extractor.extract(row).await {
            Ok(Extraction::Record(record)) => records.push(record),
            Ok(Extraction::Dropped(reason)) => {
                log::warn!(target: LOG_TARGET, "Dropping {} #{}: {reason}", row.project, row.issue_number);
                dropped += 1;
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Dropping {} #{}: {e:#}", row.project, row.issue_number);
                dropped += 1;
            }
        }

        tracker.complete(TrackedItem::Issues);
    }

    tracker.finish();

    let (records, removed) = rebalance(records);
    for project in &removed {
        log::warn!(target: LOG_TARGET, "Removing {project}: no longer balanced");
    }

    write_rows(&common.artifact(DATASET_CSV), &records)?;

    common.report(format_args!(
        "wrote {} record(s): {dropped} dropped, {} project(s) removed to keep the balance",
        records.len(),
        removed.len()
    ));
    Ok(())
}
