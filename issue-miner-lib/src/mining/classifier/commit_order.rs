//! Orderings for scanning a pull request's commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use strum::{Display, EnumString};

/// The order in which a pull request's commits are scanned for framework imports.
///
/// Scanning stops at the first match, so the order only decides which file
/// and module are reported, not whether an issue matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CommitOrder {
    /// When the commit's snapshot was stored, oldest first.
    #[default]
    DownloadTime,

    /// As the host lists the pull request's commits.
    Listed,

    /// By committer date, oldest first.
    Committed,
}

/// A commit with everything the orderings look at.
#[derive(Debug, Clone)]
pub struct CommitCandidate {
    pub sha: String,
    pub listed: usize,
    pub downloaded: Option<SystemTime>,
    pub committed: Option<DateTime<Utc>>,
}

impl CommitOrder {
    /// Sort `commits` in place. Unknown times sort last; ties keep listing order.
    pub fn sort(self, commits: &mut [CommitCandidate]) {
        match self {
            Self::DownloadTime => commits.sort_by_key(|c| (c.downloaded.is_none(), c.downloaded, c.listed)),
            Self::Listed => commits.sort_by_key(|c| c.listed),
            Self::Committed => commits.sort_by_key(|c| (c.committed.is_none(), c.committed, c.listed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core::str::FromStr;
    use core::time::Duration;

    fn candidate(sha: &str, listed: usize, downloaded_secs: Option<u64>, committed_day: Option<u32>) -> CommitCandidate {
        CommitCandidate {
            sha: sha.to_string(),
            listed,
            downloaded: downloaded_secs.map(|s| SystemTime::UNIX_EPOCH + Duration::from_secs(s)),
            committed: committed_day.map(|d| Utc.with_ymd_and_hms(2022, 1, d, 0, 0, 0).unwrap()),
        }
    }

    fn shas(commits: &[CommitCandidate]) -> Vec<&str> {
        commits.iter().map(|c| c.sha.as_str()).collect()
    }

    fn sample() -> Vec<CommitCandidate> {
        vec![
            candidate("a", 0, Some(30), Some(3)),
            candidate("b", 1, Some(10), None),
            candidate("c", 2, None, Some(1)),
            candidate("d", 3, Some(20), Some(2)),
        ]
    }

    #[test]
    fn test_download_time_order() {
        let mut commits = sample();
        CommitOrder::DownloadTime.sort(&mut commits);
        assert_eq!(shas(&commits), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_listed_order() {
        let mut commits = sample();
        commits.reverse();
        CommitOrder::Listed.sort(&mut commits);
        assert_eq!(shas(&commits), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_committed_order() {
        let mut commits = sample();
        CommitOrder::Committed.sort(&mut commits);
        assert_eq!(shas(&commits), vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn test_names() {
        #[derive(Deserialize)]
        struct Section {
            order: CommitOrder,
        }

        assert_eq!(CommitOrder::default(), CommitOrder::DownloadTime);
        assert_eq!(CommitOrder::DownloadTime.to_string(), "download-time");
        assert_eq!(CommitOrder::from_str("committed").unwrap(), CommitOrder::Committed);

        let parsed: Section = toml::from_str("order = 'listed'").unwrap();
        assert_eq!(parsed.order, CommitOrder::Listed);
    }
}
