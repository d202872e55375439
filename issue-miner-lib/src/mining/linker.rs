//! Reconstructs issue to pull request links from timeline events.

use super::crawler::issue_numbers;
use super::fetch::Fetch;
use super::project::ProjectId;
use super::snapshots::Snapshots;
use super::store::StoreKey;
use super::wire::{IssueResource, SourceIssue, TimelineEvent};
use crate::artifacts::{LinkRow, PrNumbers};

const LOG_TARGET: &str = "    linker";

const CROSS_REFERENCED: &str = "cross-referenced";

/// Pull requests of `project` that cross-reference an issue, in timeline order.
///
/// Only events whose source is a pull request count, and references to pull
/// requests of other repositories are dropped. A pull request mentioned more
/// than once is listed once.
#[must_use]
pub fn linked_pulls(project: &ProjectId, timeline: &[TimelineEvent]) -> Vec<u64> {
    let mut pulls = Vec::new();

    for event in timeline {
        if event.event.as_deref() != Some(CROSS_REFERENCED) {
            continue;
        }

        let Some(source) = event.source.as_ref().and_then(|s| s.issue.as_ref()) else {
            continue;
        };

        let Some((source_project, number)) = pull_reference(source) else {
            continue;
        };

        if !source_project.same_as(project) {
            log::trace!(target: LOG_TARGET, "Ignoring cross-reference from {source_project} PR #{number} in {project}");
            continue;
        }

        if !pulls.contains(&number) {
            pulls.push(number);
        }
    }

    pulls
}

fn pull_reference(source: &SourceIssue) -> Option<(ProjectId, u64)> {
    let pull = source.pull_request.as_ref()?;
    pull.url
        .as_deref()
        .and_then(ProjectId::parse_item_url)
        .or_else(|| pull.html_url.as_deref().and_then(ProjectId::parse_item_url))
}

/// Links found for one project.
#[derive(Debug, Default)]
pub struct ProjectLinks {
    /// Issues with at least one linked pull request.
    pub rows: Vec<LinkRow>,

    /// Issues examined, linked or not.
    pub issues: u64,

    /// Issues whose issue or timeline snapshot was not stored.
    pub skipped: u64,
}

/// Link every stored issue of `project`. Never touches the network.
pub async fn link_project(snapshots: &Snapshots, project: &ProjectId) -> crate::Result<ProjectLinks> {
    let mut links = ProjectLinks::default();

    let numbers = match issue_numbers(snapshots, project, false).await {
        Fetch::Found(numbers) => numbers,
        Fetch::Missing => {
            log::warn!(target: LOG_TARGET, "Skipping {project}: no stored issue listing");
            return Ok(links);
        }
        Fetch::Failed(e) => return Err(e),
    };

    for number in numbers {
        let issue = match snapshots.stored_json::<IssueResource>(&StoreKey::issue(project, number)) {
            Fetch::Found(issue) => issue,
            Fetch::Missing => {
                log::warn!(target: LOG_TARGET, "Skipping {project} issue #{number}: not stored");
                links.skipped += 1;
                continue;
            }
            Fetch::Failed(e) => return Err(e),
        };

        let timeline = match snapshots.stored_json::<Vec<TimelineEvent>>(&StoreKey::timeline(project, number)) {
            Fetch::Found(timeline) => timeline,
            Fetch::Missing => {
                log::warn!(target: LOG_TARGET, "Skipping {project} issue #{number}: timeline not stored");
                links.skipped += 1;
                continue;
            }
            Fetch::Failed(e) => return Err(e),
        };

        links.issues += 1;
        let pulls = linked_pulls(project, &timeline);
        if !pulls.is_empty() {
            log::debug!(target: LOG_TARGET, "{project} issue #{number} is linked to PR(s) {pulls:?}");
            links.rows.push(LinkRow::new(project, number, PrNumbers(pulls), &issue.title));
        }
    }

    Ok(links)
}
