//! CSV artifacts exchanged between pipeline stages.
//!
//! Every stage reads the artifact of the stage before it and writes its own.
//! Rows are encoded per RFC 4180, so titles containing commas or quotes
//! survive the round trip.

mod rows;

pub use rows::{
    Category, ClassifiedRow, CsvRow, DatasetRow, EligibleRow, FeedRow, LinkRow, PrNumbers, RepositoryRow, SampledRow,
};

use crate::Result;
use ohno::{IntoAppError, app_err};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const REPOSITORIES_CSV: &str = "repositories.csv";
pub const ISSUE_PR_CSV: &str = "issue_pr.csv";
pub const ELIGIBLE_CSV: &str = "eligible_issues.csv";
pub const CLASSIFIED_CSV: &str = "classified_issues.csv";
pub const SAMPLED_CSV: &str = "sampled_issues.csv";
pub const DATASET_CSV: &str = "dataset.csv";

/// Error for an input that an earlier stage should have produced.
#[must_use]
pub fn prerequisite_missing(path: &Path, producer: &str) -> ohno::AppError {
    app_err!("prerequisite missing: '{}' (run 'issue-miner {producer}' first)", path.display())
}

/// Read every row of a stage artifact.
///
/// A missing file yields a prerequisite error naming `producer`, the
/// subcommand that writes it.
pub fn read_rows<T: DeserializeOwned>(path: &Path, producer: &str) -> Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(prerequisite_missing(path, producer)),
        Err(e) => return Err(e).into_app_err_with(|| format!("opening '{}'", path.display())),
    };

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(file);
    reader
        .deserialize::<T>()
        .enumerate()
        .map(|(index, row)| row.into_app_err_with(|| format!("parsing row {} of '{}'", index + 1, path.display())))
        .collect()
}

/// Write rows to a stage artifact, replacing it atomically.
///
/// The header row is always written, even when there are no rows.
pub fn write_rows<T: CsvRow>(path: &Path, rows: &[T]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).into_app_err_with(|| format!("creating directory '{}'", dir.display()))?;

    let tmp = tempfile::NamedTempFile::new_in(dir).into_app_err_with(|| format!("creating temporary file in '{}'", dir.display()))?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(tmp);
    writer.write_record(T::HEADERS).into_app_err_with(|| format!("writing '{}'", path.display()))?;
    for row in rows {
        writer.serialize(row).into_app_err_with(|| format!("writing '{}'", path.display()))?;
    }

    let mut tmp = writer.into_inner().map_err(|e| app_err!("flushing '{}': {}", path.display(), e.error()))?;
    tmp.flush().into_app_err_with(|| format!("flushing '{}'", path.display()))?;
    let _ = tmp.persist(path).into_app_err_with(|| format!("writing '{}'", path.display()))?;
    Ok(())
}
