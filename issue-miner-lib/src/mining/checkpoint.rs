//! Persisted per-stage progress cursors.
//!
//! A network stage records how many of its input rows are fully processed after
//! each one completes, so an interrupted run resumes at the first unfinished row
//! instead of rescanning the store for what already exists.

use crate::Result;
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "checkpoint";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CheckpointDoc {
    stage: String,
    input_rows: usize,
    next_row: usize,
    updated_at: DateTime<Utc>,
}

/// The cursor for one stage, backed by `<dir>/<stage>.json`.
#[derive(Debug)]
pub struct Checkpoint {
    path: PathBuf,
    stage: String,
    input_rows: usize,
    next_row: usize,
}

impl Checkpoint {
    /// Load the cursor for `stage`, or start at row 0.
    ///
    /// A saved cursor is discarded when `restart` is set or when it was recorded
    /// against an input of a different length.
    pub fn open(dir: &Path, stage: &str, input_rows: usize, restart: bool) -> Result<Self> {
        let path = dir.join(format!("{stage}.json"));
        let mut checkpoint = Self {
            path,
            stage: stage.to_string(),
            input_rows,
            next_row: 0,
        };

        if restart {
            log::info!(target: LOG_TARGET, "Restarting stage '{stage}' from the first row");
            return Ok(checkpoint);
        }

        let text = match fs::read_to_string(&checkpoint.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(checkpoint),
            Err(e) => return Err(e).into_app_err_with(|| format!("reading checkpoint '{}'", checkpoint.path.display())),
        };

        let doc: CheckpointDoc = match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Ignoring unreadable checkpoint '{}': {e}", checkpoint.path.display());
                return Ok(checkpoint);
            }
        };

        if doc.stage != stage || doc.input_rows != input_rows {
            log::warn!(
                target: LOG_TARGET,
                "Ignoring checkpoint for stage '{}' recorded over {} row(s); the input now has {input_rows}",
                doc.stage,
                doc.input_rows
            );
            return Ok(checkpoint);
        }

        checkpoint.next_row = doc.next_row.min(input_rows);
        log::info!(target: LOG_TARGET, "Resuming stage '{stage}' at row {} of {input_rows}", checkpoint.next_row);
        Ok(checkpoint)
    }

    /// First row that still needs processing.
    #[must_use]
    pub const fn next_row(&self) -> usize {
        self.next_row
    }

    /// Record that all rows before `next_row` are done and persist the cursor.
    pub fn advance(&mut self, next_row: usize) -> Result<()> {
        self.next_row = next_row.min(self.input_rows);
        self.save()
    }

    fn save(&self) -> Result<()> {
        let doc = CheckpointDoc {
            stage: self.stage.clone(),
            input_rows: self.input_rows,
            next_row: self.next_row,
            updated_at: Utc::now(),
        };

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).into_app_err_with(|| format!("creating checkpoint directory '{}'", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).into_app_err("creating temporary checkpoint file")?;
        serde_json::to_writer_pretty(&mut tmp, &doc).into_app_err("serializing checkpoint")?;
        tmp.flush().into_app_err("flushing checkpoint")?;
        let _ = tmp
            .persist(&self.path)
            .into_app_err_with(|| format!("writing checkpoint '{}'", self.path.display()))?;
        Ok(())
    }
}
