//! Walks a repository's issues and pull requests into the snapshot store.
//!
//! The crawl has two passes. The issue pass lists a repository's issue numbers
//! and stores every issue with its timeline. The pull request pass runs later,
//! once linking has named the interesting pull requests, and stores each pull
//! request with its commits and the changed source files of those commits.
//!
//! Every resource goes through [`Snapshots`], so anything already stored is
//! never requested again.

use super::fetch::Fetch;
use super::project::ProjectId;
use super::snapshots::Snapshots;
use super::stage_tracker::{StageTracker, TrackedItem};
use super::store::StoreKey;
use super::wire::{CommitEntry, CommitResource, NumberedItem, PullResource};
use core::ops::AddAssign;
use std::collections::{BTreeSet, HashSet};

const LOG_TARGET: &str = "   crawler";

/// Tallies of a crawl, summed across projects.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrawlStats {
    pub projects: u64,
    pub issues: u64,
    pub pulls: u64,
    pub commits: u64,
    pub files: u64,
    pub missing: u64,
    pub failed: u64,
}

impl AddAssign for CrawlStats {
    fn add_assign(&mut self, other: Self) {
        self.projects += other.projects;
        self.issues += other.issues;
        self.pulls += other.pulls;
        self.commits += other.commits;
        self.files += other.files;
        self.missing += other.missing;
        self.failed += other.failed;
    }
}

impl CrawlStats {
    /// Count a fetch outcome as missing or failed, logging the item.
    ///
    /// Returns the data when there is some.
    fn note<T>(&mut self, what: &str, fetched: Fetch<T>) -> Option<T> {
        match fetched {
            Fetch::Found(data) => Some(data),
            Fetch::Missing => {
                log::warn!(target: LOG_TARGET, "Skipping {what}: not found on host");
                self.missing += 1;
                None
            }
            Fetch::Failed(e) => {
                log::warn!(target: LOG_TARGET, "Skipping {what}: {e:#}");
                self.failed += 1;
                None
            }
        }
    }
}

/// Issue numbers of a repository: everything the issue listing reports that the
/// pull listing does not, ascending.
///
/// The host's issue listing includes pull requests, and an issue number that
/// belongs to a pull request redirects to it.
#[must_use]
pub fn issue_numbers_from(issues: &[NumberedItem], pulls: &[NumberedItem]) -> Vec<u64> {
    let pulls: HashSet<u64> = pulls.iter().map(|p| p.number).collect();
    let numbers: BTreeSet<u64> = issues.iter().map(|i| i.number).filter(|n| !pulls.contains(n)).collect();
    numbers.into_iter().collect()
}

/// The issue numbers of `project`, from the stored listings or, when `online`,
/// from the host.
pub async fn issue_numbers(snapshots: &Snapshots, project: &ProjectId, online: bool) -> Fetch<Vec<u64>> {
    let base = api_base(project);

    let issues = match snapshots
        .listing_json_if::<Vec<NumberedItem>>(online, &StoreKey::issue_list(project), &format!("{base}/issues?state=all"))
        .await
    {
        Fetch::Found(issues) => issues,
        Fetch::Missing => return Fetch::Missing,
        Fetch::Failed(e) => return Fetch::Failed(e),
    };

    let pulls = match snapshots
        .listing_json_if::<Vec<NumberedItem>>(online, &StoreKey::pull_list(project), &format!("{base}/pulls?state=all"))
        .await
    {
        Fetch::Found(pulls) => pulls,
        Fetch::Missing => Vec::new(),
        Fetch::Failed(e) => return Fetch::Failed(e),
    };

    Fetch::Found(issue_numbers_from(&issues, &pulls))
}

fn api_base(project: &ProjectId) -> String {
    format!("/repos/{}/{}", project.owner(), project.repo())
}

/// Fills the snapshot store for the later, offline stages.
#[derive(Debug, Clone)]
pub struct IssuePRCrawler {
    snapshots: Snapshots,
    tracker: StageTracker,
    source_extension: String,
}

impl IssuePRCrawler {
    #[must_use]
    pub fn new(snapshots: Snapshots, tracker: StageTracker, source_extension: &str) -> Self {
        Self {
            snapshots,
            tracker,
            source_extension: source_extension.trim_start_matches('.').to_string(),
        }
    }

    #[must_use]
    pub const fn snapshots(&self) -> &Snapshots {
        &self.snapshots
    }

    /// Issue pass: store every issue of `project` together with its timeline.
    pub async fn crawl_issues(&self, project: &ProjectId) -> CrawlStats {
        let mut stats = CrawlStats::default();
        let Some(numbers) = stats.note(&format!("issue listing of {project}"), issue_numbers(&self.snapshots, project, true).await) else {
            return stats;
        };

        let base = api_base(project);
        let total = numbers.len();
        self.tracker.add(TrackedItem::Issues, total as u64);
        log::info!(target: LOG_TARGET, "Crawling {total} issue(s) of {project}");

        for (index, number) in numbers.into_iter().enumerate() {
            log::info!(target: LOG_TARGET, "Project {project}, issue #{number} ({}/{total})", index + 1);

            let issue = self
                .snapshots
                .resource(&StoreKey::issue(project, number), &format!("{base}/issues/{number}"))
                .await;

            if stats.note(&format!("{project} issue #{number}"), issue).is_some() {
                let timeline = self
                    .snapshots
                    .listing(&StoreKey::timeline(project, number), &format!("{base}/issues/{number}/timeline"))
                    .await;

                if stats.note(&format!("{project} timeline #{number}"), timeline).is_some() {
                    stats.issues += 1;
                }
            }

            self.tracker.complete(TrackedItem::Issues);
        }

        stats.projects += 1;
        stats
    }

    /// The pull request snapshot, fetched from the host only when `online`.
    pub async fn pull(&self, project: &ProjectId, number: u64, online: bool) -> Fetch<PullResource> {
        self.snapshots
            .resource_json_if(online, &StoreKey::pull(project, number), &format!("{}/pulls/{number}", api_base(project)))
            .await
    }

    /// Pull request pass: store the commits of a pull request and the changed
    /// source files of each commit.
    ///
    /// A pull request without commits is recorded as missing.
    pub async fn crawl_pull_files(&self, project: &ProjectId, number: u64) -> CrawlStats {
        let mut stats = CrawlStats::default();
        let base = api_base(project);

        let commits = self
            .snapshots
            .listing_json::<Vec<CommitEntry>>(&StoreKey::pull_commits(project, number), &format!("{base}/pulls/{number}/commits"))
            .await;

        let Some(commits) = stats.note(&format!("{project} commits of PR #{number}"), commits) else {
            return stats;
        };

        if commits.is_empty() {
            log::warn!(target: LOG_TARGET, "Skipping {project} PR #{number}: no commits");
            stats.missing += 1;
            return stats;
        }

        for entry in commits {
            let commit = self
                .snapshots
                .resource_json::<CommitResource>(&StoreKey::commit(project, &entry.sha), &format!("{base}/commits/{}", entry.sha))
                .await;

            let Some(commit) = stats.note(&format!("{project} commit {}", entry.sha), commit) else {
                continue;
            };
            stats.commits += 1;

            let sources = commit
                .files
                .iter()
                .filter(|file| file.has_extension(&self.source_extension) && file.status.as_deref() != Some("removed"));

            for file in sources {
                let Some(raw_url) = file.raw_url.as_deref() else {
                    log::debug!(target: LOG_TARGET, "No raw link for '{}' in commit {}", file.filename, commit.sha);
                    continue;
                };

                self.tracker.add(TrackedItem::Files, 1);
                let key = StoreKey::pull_file(project, number, &commit.sha, &file.filename);
                if stats.note(&format!("'{}' of commit {}", file.filename, commit.sha), self.snapshots.raw(&key, raw_url).await).is_some() {
                    stats.files += 1;
                }
                self.tracker.complete(TrackedItem::Files);
            }
        }

        stats.pulls += 1;
        stats
    }
}
