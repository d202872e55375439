use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::artifacts::{CLASSIFIED_CSV, ClassifiedRow, SAMPLED_CSV, read_rows, write_rows};
use crate::mining::DatasetSampler;
use clap::Parser;

#[derive(Parser, Debug)]
pub struct SampleArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_sample<H: Host>(host: &mut H, args: &SampleArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common).await?;
    sample_issues(&mut common)
}

/// Draw the balanced comparison set and write `sampled_issues.csv`.
pub fn sample_issues<H: Host>(common: &mut Common<'_, H>) -> Result<()> {
    let rows: Vec<ClassifiedRow> = read_rows(&common.artifact(CLASSIFIED_CSV), "classify")?;

    let outcome = DatasetSampler::new(common.config.sample.seed).sample(&rows);
    write_rows(&common.artifact(SAMPLED_CSV), &outcome.rows)?;

    common.report(format_args!(
        "sampled {} issue(s) from {} project(s), {} excluded",
        outcome.rows.len(),
        outcome.ml_counts.len() - outcome.excluded.len(),
        outcome.excluded.len()
    ));

    for (project, k) in &outcome.ml_counts {
        common.report(format_args!("  {project}: {k} ml"));
    }

    if !outcome.excluded.is_empty() {
        common.report(format_args!("  excluded: {}", outcome.excluded.join(", ")));
    }

    Ok(())
}
