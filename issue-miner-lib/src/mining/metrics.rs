//! Per-record metrics for the final dataset.

use super::fetch::Fetch;
use super::project::ProjectId;
use super::snapshots::Snapshots;
use super::store::StoreKey;
use super::wire::{IssueResource, PullResource};
use crate::Result;
use crate::artifacts::{Category, DatasetRow, SampledRow};
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use std::collections::BTreeMap;

const LOG_TARGET: &str = "   metrics";

/// Magnitude of a pull request's diff: `|additions - deletions|`.
#[must_use]
pub const fn line_change(additions: u64, deletions: u64) -> u64 {
    additions.abs_diff(deletions)
}

/// Whole days between an issue's creation and closure, or `None` while open.
#[must_use]
pub fn fix_duration_days(created_at: DateTime<Utc>, closed_at: Option<DateTime<Utc>>) -> Option<i64> {
    closed_at.map(|closed_at| (closed_at - created_at).num_days())
}

/// Why a sampled issue did not make it into the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    IssueUnavailable,
    NotClosed,
    NoMergedPull,
    NoDiffStats(u64),
}

impl Display for DropReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::IssueUnavailable => write!(f, "issue snapshot unavailable"),
            Self::NotClosed => write!(f, "issue has no closing date"),
            Self::NoMergedPull => write!(f, "no merged pull request available"),
            Self::NoDiffStats(pull) => write!(f, "PR #{pull} has no diff statistics"),
        }
    }
}

/// Outcome of measuring one sampled issue.
#[derive(Debug)]
pub enum Extraction {
    Record(DatasetRow),
    Dropped(DropReason),
}

/// Builds dataset records from sampled issues and their snapshots.
#[derive(Debug, Clone)]
pub struct MetricsExtractor {
    snapshots: Snapshots,
}

impl MetricsExtractor {
    #[must_use]
    pub const fn new(snapshots: Snapshots) -> Self {
        Self { snapshots }
    }

    /// Measure one sampled issue against its first merged pull request.
    ///
    /// Issue and pull request snapshots missing from the store are fetched.
    pub async fn extract(&self, row: &SampledRow) -> Result<Extraction> {
        let project = row.project()?;
        let base = format!("/repos/{}/{}", project.owner(), project.repo());

        let issue = match self
            .snapshots
            .resource_json::<IssueResource>(&StoreKey::issue(&project, row.issue_number), &format!("{base}/issues/{}", row.issue_number))
            .await
        {
            Fetch::Found(issue) => issue,
            Fetch::Missing => return Ok(Extraction::Dropped(DropReason::IssueUnavailable)),
            Fetch::Failed(e) => {
                log::warn!(target: LOG_TARGET, "Could not read {project} issue #{}: {e:#}", row.issue_number);
                return Ok(Extraction::Dropped(DropReason::IssueUnavailable));
            }
        };

        let Some(fix_duration_days) = fix_duration_days(issue.created_at, issue.closed_at) else {
            return Ok(Extraction::Dropped(DropReason::NotClosed));
        };

        let Some(pull) = self.first_merged_pull(&project, row).await else {
            return Ok(Extraction::Dropped(DropReason::NoMergedPull));
        };

        let (Some(additions), Some(deletions)) = (pull.additions, pull.deletions) else {
            return Ok(Extraction::Dropped(DropReason::NoDiffStats(pull.number)));
        };

        Ok(Extraction::Record(DatasetRow {
            project: row.project.clone(),
            issue_url: project.issue_url(row.issue_number),
            pr_url: project.pull_url(pull.number),
            line_change: line_change(additions, deletions),
            fix_duration_days,
            category: row.category,
        }))
    }

    async fn first_merged_pull(&self, project: &ProjectId, row: &SampledRow) -> Option<PullResource> {
        for number in row.merged_pulls.iter() {
            let path = format!("/repos/{}/{}/pulls/{number}", project.owner(), project.repo());
            match self.snapshots.resource_json::<PullResource>(&StoreKey::pull(project, number), &path).await {
                Fetch::Found(pull) if pull.is_merged() => return Some(pull),
                Fetch::Found(_) => log::debug!(target: LOG_TARGET, "{project} PR #{number} is not merged"),
                Fetch::Missing => log::warn!(target: LOG_TARGET, "{project} PR #{number} is not available"),
                Fetch::Failed(e) => log::warn!(target: LOG_TARGET, "Could not read {project} PR #{number}: {e:#}"),
            }
        }

        None
    }
}

/// Drop every project whose ML and non-ML record counts differ.
///
/// Returns the kept records, in their original order, and the dropped projects.
#[must_use]
pub fn rebalance(records: Vec<DatasetRow>) -> (Vec<DatasetRow>, Vec<String>) {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for record in &records {
        let (ml, non_ml) = counts.entry(record.project.as_str()).or_default();
        match record.category {
            Category::Ml => *ml += 1,
            Category::NonMl => *non_ml += 1,
        }
    }

    let unbalanced: Vec<String> = counts
        .into_iter()
        .filter(|(_, (ml, non_ml))| ml != non_ml)
        .map(|(project, _)| project.to_string())
        .collect();

    let kept = records.into_iter().filter(|r| !unbalanced.contains(&r.project)).collect();
    (kept, unbalanced)
}
