//! Host resource shapes, reduced to the fields the pipeline reads.
//!
//! Snapshots are stored verbatim; these types are only used to read them back.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Open/closed state shared by issues and pull requests.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Open,
    Closed,
}

/// `GET /repos/{owner}/{repo}`
#[derive(Debug, Clone, Deserialize)]
pub struct RepoResource {
    pub created_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub stargazers_count: Option<u64>,
    pub language: Option<String>,
}

/// Any list entry that carries a number (issues, pulls).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NumberedItem {
    pub number: u64,
}

/// `GET /repos/{owner}/{repo}/issues/{n}`
#[derive(Debug, Clone, Deserialize)]
pub struct IssueResource {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    pub state: ItemState,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub pull_request: Option<serde_json::Value>,
}

/// `GET /repos/{owner}/{repo}/pulls/{n}`
#[derive(Debug, Clone, Deserialize)]
pub struct PullResource {
    pub number: u64,
    pub state: ItemState,
    pub merged_at: Option<DateTime<Utc>>,
    pub merge_commit_sha: Option<String>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
}

impl PullResource {
    /// Closed and merged into the target branch.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.state == ItemState::Closed && self.merged_at.is_some()
    }
}

/// One entry of `GET /repos/{owner}/{repo}/issues/{n}/timeline`
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEvent {
    pub event: Option<String>,
    pub source: Option<EventSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSource {
    pub issue: Option<SourceIssue>,
}

/// The issue or pull request that mentioned the timeline's issue.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceIssue {
    pub number: Option<u64>,
    pub pull_request: Option<PullReference>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullReference {
    pub url: Option<String>,
    pub html_url: Option<String>,
}

/// One entry of `GET /repos/{owner}/{repo}/pulls/{n}/commits`
#[derive(Debug, Clone, Deserialize)]
pub struct CommitEntry {
    pub sha: String,
}

/// `GET /repos/{owner}/{repo}/commits/{sha}`
#[derive(Debug, Clone, Deserialize)]
pub struct CommitResource {
    pub sha: String,
    pub commit: Option<CommitDetails>,
    #[serde(default)]
    pub files: Vec<ChangedFile>,
}

impl CommitResource {
    #[must_use]
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.commit.as_ref()?.committer.as_ref()?.date
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetails {
    pub committer: Option<Signature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signature {
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub raw_url: Option<String>,
    pub status: Option<String>,
}

impl ChangedFile {
    /// Whether the file's extension equals `extension` (without the dot).
    #[must_use]
    pub fn has_extension(&self, extension: &str) -> bool {
        std::path::Path::new(&self.filename)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_deserialize() {
        let json = r#"{
            "number": 42,
            "title": "Gradient explodes",
            "state": "closed",
            "created_at": "2022-01-01T00:00:00Z",
            "closed_at": "2022-01-05T00:00:00Z",
            "user": {"login": "someone"}
        }"#;

        let issue: IssueResource = serde_json::from_str(json).unwrap();
        assert_eq!(issue.number, 42);
        assert_eq!(issue.state, ItemState::Closed);
        assert!(issue.closed_at.is_some());
        assert!(issue.pull_request.is_none());
    }

    #[test]
    fn test_pull_merged() {
        let merged: PullResource = serde_json::from_str(
            r#"{"number": 43, "state": "closed", "merged_at": "2022-01-04T00:00:00Z", "merge_commit_sha": "abc", "additions": 120, "deletions": 30}"#,
        )
        .unwrap();
        assert!(merged.is_merged());
        assert_eq!(merged.additions, Some(120));

        let closed_unmerged: PullResource =
            serde_json::from_str(r#"{"number": 44, "state": "closed", "merged_at": null, "merge_commit_sha": null}"#).unwrap();
        assert!(!closed_unmerged.is_merged());

        let open: PullResource = serde_json::from_str(r#"{"number": 45, "state": "open", "merged_at": null}"#).unwrap();
        assert!(!open.is_merged());
    }

    #[test]
    fn test_timeline_cross_reference_deserialize() {
        let json = r#"{
            "event": "cross-referenced",
            "source": {
                "type": "issue",
                "issue": {
                    "number": 43,
                    "pull_request": {"url": "https://api.github.com/repos/foo/bar/pulls/43"}
                }
            }
        }"#;

        let event: TimelineEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event.as_deref(), Some("cross-referenced"));
        let source_issue = event.source.unwrap().issue.unwrap();
        assert_eq!(source_issue.number, Some(43));
        assert!(source_issue.pull_request.unwrap().url.is_some());
    }

    #[test]
    fn test_timeline_event_without_source() {
        let event: TimelineEvent = serde_json::from_str(r#"{"event": "labeled"}"#).unwrap();
        assert!(event.source.is_none());
    }

    #[test]
    fn test_commit_resource() {
        let json = r#"{
            "sha": "abc123",
            "commit": {"committer": {"date": "2022-01-03T10:00:00Z"}},
            "files": [
                {"filename": "src/train.py", "raw_url": "https://example.com/raw/train.py", "status": "modified"},
                {"filename": "README.md", "raw_url": "https://example.com/raw/README.md"}
            ]
        }"#;

        let commit: CommitResource = serde_json::from_str(json).unwrap();
        assert_eq!(commit.files.len(), 2);
        assert!(commit.files[0].has_extension("py"));
        assert!(!commit.files[1].has_extension("py"));
        assert!(commit.committed_at().is_some());
    }

    #[test]
    fn test_repo_resource_optional_fields() {
        let repo: RepoResource = serde_json::from_str(r#"{"stargazers_count": 500}"#).unwrap();
        assert_eq!(repo.stargazers_count, Some(500));
        assert!(repo.created_at.is_none());
    }
}
