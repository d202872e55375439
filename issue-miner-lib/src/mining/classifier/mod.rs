//! Labels eligible issues as ML or non-ML.
//!
//! An issue is ML when both hold:
//!
//! - some changed source file in some commit of one of its merged pull requests
//!   imports a machine-learning framework, and
//! - its title contains a term from the ML glossary.
//!
//! Both checks run in one pass over stored snapshots; nothing is fetched.

mod commit_order;
mod glossary_html;
mod imports;
mod keywords;

pub use commit_order::{CommitCandidate, CommitOrder};
pub use glossary_html::extract_glossary_terms;
pub use imports::{extract_imports, find_framework};
pub use keywords::{Glossary, normalize_title};

use super::fetch::Fetch;
use super::project::ProjectId;
use super::snapshots::Snapshots;
use super::store::{Lookup, StoreKey};
use super::wire::{CommitEntry, CommitResource};
use crate::Result;
use crate::artifacts::{Category, ClassifiedRow, EligibleRow};

const LOG_TARGET: &str = "classifier";

/// A framework import found in a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkMatch {
    pub pull: u64,
    pub sha: String,
    pub file: String,
    pub module: String,
    pub framework: String,
}

/// What the import scan found in one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullScan {
    Match(FrameworkMatch),
    NoMatch,

    /// Nothing is stored for the pull request, e.g. because it has no commits.
    Missing,
}

/// Outcome of classifying one issue.
#[derive(Debug, Clone)]
pub struct Classification {
    pub row: ClassifiedRow,

    /// Linked pull requests with nothing stored to scan.
    pub missing_pulls: Vec<u64>,
}

/// Import scan plus glossary check over the snapshot store.
#[derive(Debug, Clone)]
pub struct MLContentClassifier {
    snapshots: Snapshots,
    frameworks: Vec<String>,
    source_extension: String,
    order: CommitOrder,
    glossary: Glossary,
}

impl MLContentClassifier {
    #[must_use]
    pub fn new(snapshots: Snapshots, frameworks: Vec<String>, source_extension: &str, order: CommitOrder, glossary: Glossary) -> Self {
        Self {
            snapshots,
            frameworks,
            source_extension: source_extension.trim_start_matches('.').to_string(),
            order,
            glossary,
        }
    }

    /// Scan the stored commits of one pull request, stopping at the first
    /// framework import.
    pub fn scan_pull(&self, project: &ProjectId, pull: u64) -> Result<PullScan> {
        let commits = match self.snapshots.stored_json::<Vec<CommitEntry>>(&StoreKey::pull_commits(project, pull)) {
            Fetch::Found(commits) if !commits.is_empty() => commits,
            Fetch::Found(_) | Fetch::Missing => return Ok(PullScan::Missing),
            Fetch::Failed(e) => return Err(e),
        };

        let mut candidates = Vec::with_capacity(commits.len());
        let mut resources = Vec::with_capacity(commits.len());
        for (listed, entry) in commits.into_iter().enumerate() {
            let key = StoreKey::commit(project, &entry.sha);
            let Some(commit) = self.snapshots.stored_json::<CommitResource>(&key).found() else {
                log::debug!(target: LOG_TARGET, "{project} commit {} is not stored", entry.sha);
                continue;
            };

            candidates.push(CommitCandidate {
                sha: entry.sha,
                listed,
                downloaded: self.snapshots.store().modified(&key),
                committed: commit.committed_at(),
            });
            resources.push(commit);
        }

        if candidates.is_empty() {
            return Ok(PullScan::Missing);
        }

        self.order.sort(&mut candidates);

        for candidate in &candidates {
            let Some(commit) = resources.iter().find(|c| c.sha == candidate.sha) else {
                continue;
            };

            for file in commit.files.iter().filter(|f| f.has_extension(&self.source_extension)) {
                let key = StoreKey::pull_file(project, pull, &commit.sha, &file.filename);
                let Lookup::Present(source) = self.snapshots.store().lookup(&key)? else {
                    continue;
                };

                let imports = extract_imports(&source);
                if let Some((module, framework)) = find_framework(&imports, &self.frameworks) {
                    log::debug!(
                        target: LOG_TARGET,
                        "{project} PR #{pull}: '{}' in commit {} imports {module}",
                        file.filename,
                        commit.sha
                    );
                    return Ok(PullScan::Match(FrameworkMatch {
                        pull,
                        sha: commit.sha.clone(),
                        file: file.filename.clone(),
                        module: module.to_string(),
                        framework: framework.to_string(),
                    }));
                }
            }
        }

        Ok(PullScan::NoMatch)
    }

    /// Classify one eligible issue.
    pub fn classify(&self, row: &EligibleRow) -> Result<Classification> {
        let project = row.project()?;
        let mut missing_pulls = Vec::new();
        let mut framework = None;

        for pull in row.merged_pulls.iter() {
            match self.scan_pull(&project, pull)? {
                PullScan::Match(found) => {
                    framework = Some(found);
                    break;
                }
                PullScan::NoMatch => {}
                PullScan::Missing => {
                    log::warn!(target: LOG_TARGET, "No files stored for {project} PR #{pull}");
                    missing_pulls.push(pull);
                }
            }
        }

        let keyword = self.glossary.find_in(&row.title);
        let category = if framework.is_some() && keyword.is_some() { Category::Ml } else { Category::NonMl };

        Ok(Classification {
            row: ClassifiedRow {
                project: row.project.clone(),
                issue_url: row.issue_url.clone(),
                issue_number: row.issue_number,
                merged_pulls: row.merged_pulls.clone(),
                title: row.title.clone(),
                framework_import: framework.is_some(),
                matched_module: framework.map(|f| f.module).unwrap_or_default(),
                keyword: keyword.unwrap_or_default(),
                category,
            },
            missing_pulls,
        })
    }
}
