use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::artifacts::{CLASSIFIED_CSV, Category, ELIGIBLE_CSV, EligibleRow, prerequisite_missing, read_rows, write_rows};
use crate::mining::{Glossary, MLContentClassifier, TrackedItem};
use clap::Parser;

const LOG_TARGET: &str = "  classify";

#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_classify<H: Host>(host: &mut H, args: &ClassifyArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common).await?;
    classify_issues(&mut common)
}

/// Label every eligible issue `ml` or `non-ml` and write `classified_issues.csv`.
pub fn classify_issues<H: Host>(common: &mut Common<'_, H>) -> Result<()> {
    let rows: Vec<EligibleRow> = read_rows(&common.artifact(ELIGIBLE_CSV), "pulls")?;

    let settings = &common.config.classify;
    let glossary_path = settings.glossary_path(&common.data_dir);
    if !glossary_path.exists() {
        return Err(prerequisite_missing(glossary_path.as_std_path(), "glossary"));
    }

    let glossary = Glossary::load(glossary_path.as_std_path(), &settings.glossary_column)?;
    if glossary.is_empty() {
        log::warn!(target: LOG_TARGET, "Glossary '{glossary_path}' has no keywords; every issue will be non-ml");
    }

    let classifier = MLContentClassifier::new(
        common.snapshots.clone(),
        settings.frameworks.clone(),
        &settings.source_extension,
        settings.commit_order,
        glossary,
    );

    let tracker = common.tracker("Classifying");
    tracker.add(TrackedItem::Issues, rows.len() as u64);

    let total = rows.len();
    let mut classified = Vec::with_capacity(total);
    let mut missing_pulls = 0;
    let mut skipped = 0;

    for (index, row) in rows.iter().enumerate() {
        log::info!(target: LOG_TARGET, "Issue {}/{total}: {} #{}", index + 1, row.project, row.issue_number);

        match classifier.classify(row) {
            Ok(classification) => {
                missing_pulls += classification.missing_pulls.len();
                classified.push(classification.row);
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Skipping {} #{}: {e:#}", row.project, row.issue_number);
                skipped += 1;
            }
        }

        tracker.complete(TrackedItem::Issues);
    }

    tracker.finish();
    write_rows(&common.artifact(CLASSIFIED_CSV), &classified)?;

    let ml = classified.iter().filter(|row| row.category == Category::Ml).count();
    common.report(format_args!(
        "classified {} issue(s): {ml} ml, {} non-ml, {skipped} skipped, {missing_pulls} pull request(s) with nothing stored",
        classified.len(),
        classified.len() - ml
    ));
    Ok(())
}
