//! Which linked issues qualify for the dataset.

use super::crawler::IssuePRCrawler;
use super::fetch::Fetch;
use super::project::ProjectId;
use super::store::StoreKey;
use super::wire::{IssueResource, ItemState, PullResource};
use crate::artifacts::{EligibleRow, LinkRow, PrNumbers};

const LOG_TARGET: &str = "  eligible";

/// Closed, with at least one merged linked pull request.
#[must_use]
pub fn is_eligible(issue: &IssueResource, merged_pulls: &[u64]) -> bool {
    issue.state == ItemState::Closed && !merged_pulls.is_empty()
}

/// The merged pull requests among `pulls`, in their original order.
#[must_use]
pub fn merged_pulls<'a>(pulls: impl IntoIterator<Item = &'a PullResource>) -> Vec<u64> {
    pulls.into_iter().filter(|p| p.is_merged()).map(|p| p.number).collect()
}

/// Verdict on one linked issue.
#[derive(Debug)]
pub enum Eligibility {
    Eligible(EligibleRow),
    NotEligible,

    /// The host has no issue snapshot.
    Skipped,

    /// The issue or one of its pull requests could not be fetched; the reason was
    /// logged. The row must be checked again on the next run.
    Failed,
}

/// Decide whether a linked issue is eligible, fetching pull request snapshots
/// when `online`.
///
/// Pull requests the host does not have count as not merged. A pull request that
/// could not be fetched leaves the verdict open, so the issue is reported as
/// [`Eligibility::Failed`] rather than judged on partial data.
pub async fn check_issue(crawler: &IssuePRCrawler, project: &ProjectId, row: &LinkRow, online: bool) -> Eligibility {
    let snapshots = crawler.snapshots();
    let issue_path = format!("/repos/{}/{}/issues/{}", project.owner(), project.repo(), row.issue_number);
    let issue = match snapshots
        .resource_json_if::<IssueResource>(online, &StoreKey::issue(project, row.issue_number), &issue_path)
        .await
    {
        Fetch::Found(issue) => issue,
        Fetch::Missing => {
            log::warn!(target: LOG_TARGET, "Skipping {project} issue #{}: not available", row.issue_number);
            return Eligibility::Skipped;
        }
        Fetch::Failed(e) => {
            log::warn!(target: LOG_TARGET, "Could not fetch {project} issue #{}: {e:#}", row.issue_number);
            return Eligibility::Failed;
        }
    };

    let mut pulls = Vec::with_capacity(row.pulls.0.len());
    let mut failed = false;
    for number in row.pulls.iter() {
        match crawler.pull(project, number, online).await {
            Fetch::Found(pull) => pulls.push(pull),
            Fetch::Missing => log::warn!(target: LOG_TARGET, "{project} PR #{number} is not available"),
            Fetch::Failed(e) => {
                log::warn!(target: LOG_TARGET, "Could not fetch {project} PR #{number}: {e:#}");
                failed = true;
            }
        }
    }

    if failed {
        return Eligibility::Failed;
    }

    let merged = merged_pulls(&pulls);
    if !is_eligible(&issue, &merged) {
        log::debug!(target: LOG_TARGET, "{project} issue #{} is not eligible", row.issue_number);
        return Eligibility::NotEligible;
    }

    Eligibility::Eligible(EligibleRow {
        project: row.project.clone(),
        issue_url: row.issue_url.clone(),
        issue_number: row.issue_number,
        merged_pulls: PrNumbers(merged),
        title: row.title.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(state: &str) -> IssueResource {
        serde_json::from_str(&format!(r#"{{"number": 42, "title": "t", "state": "{state}", "created_at": "2022-01-01T00:00:00Z"}}"#))
            .unwrap()
    }

    fn pull(number: u64, state: &str, merged_at: Option<&str>) -> PullResource {
        let merged_at = merged_at.map_or_else(|| "null".to_string(), |m| format!("\"{m}\""));
        serde_json::from_str(&format!(r#"{{"number": {number}, "state": "{state}", "merged_at": {merged_at}}}"#)).unwrap()
    }

    #[test]
    fn test_merged_pulls_keep_order() {
        let pulls = [
            pull(50, "closed", Some("2022-01-04T00:00:00Z")),
            pull(44, "closed", None),
            pull(43, "closed", Some("2022-01-03T00:00:00Z")),
            pull(45, "open", None),
        ];
        assert_eq!(merged_pulls(&pulls), vec![50, 43]);
    }

    #[test]
    fn test_closed_issue_with_merged_pull_is_eligible() {
        assert!(is_eligible(&issue("closed"), &[43]));
    }

    #[test]
    fn test_open_issue_is_not_eligible() {
        assert!(!is_eligible(&issue("open"), &[43]));
    }

    #[test]
    fn test_issue_without_merged_pull_is_not_eligible() {
        assert!(!is_eligible(&issue("closed"), &[]));
    }
}
