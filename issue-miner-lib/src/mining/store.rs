//! Key-value storage for raw host snapshots.
//!
//! Every snapshot the crawler retrieves is kept permanently under a stable
//! [`StoreKey`], which is what makes each stage resumable: a stage asks the
//! store before it asks the network. [`FsStore`] lays keys out as the familiar
//! `{owner}*{repo}/issue/{n}.json` tree; [`MemoryStore`] backs tests.

use super::path_utils::{flatten_repo_path, sanitize_path_component};
use super::project::ProjectId;
use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const LOG_TARGET: &str = "     store";

/// Suffix of the marker file recording that the host has no such resource.
const MISSING_SUFFIX: &str = ".missing";

/// The kinds of snapshot kept per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Repository,
    IssueList,
    PullList,
    Issue,
    Timeline,
    Pull,
    PullCommits,
    Commit,
    PullFile,
}

/// Identifies one snapshot: (owner, repo, kind, number[, sub-key]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub project: ProjectId,
    pub kind: ResourceKind,
    pub number: Option<u64>,
    pub sub_key: Option<String>,
}

impl StoreKey {
    const fn project_level(project: ProjectId, kind: ResourceKind) -> Self {
        Self {
            project,
            kind,
            number: None,
            sub_key: None,
        }
    }

    const fn numbered(project: ProjectId, kind: ResourceKind, number: u64) -> Self {
        Self {
            project,
            kind,
            number: Some(number),
            sub_key: None,
        }
    }

    #[must_use]
    pub fn repository(project: &ProjectId) -> Self {
        Self::project_level(project.clone(), ResourceKind::Repository)
    }

    #[must_use]
    pub fn issue_list(project: &ProjectId) -> Self {
        Self::project_level(project.clone(), ResourceKind::IssueList)
    }

    #[must_use]
    pub fn pull_list(project: &ProjectId) -> Self {
        Self::project_level(project.clone(), ResourceKind::PullList)
    }

    #[must_use]
    pub fn issue(project: &ProjectId, number: u64) -> Self {
        Self::numbered(project.clone(), ResourceKind::Issue, number)
    }

    #[must_use]
    pub fn timeline(project: &ProjectId, number: u64) -> Self {
        Self::numbered(project.clone(), ResourceKind::Timeline, number)
    }

    #[must_use]
    pub fn pull(project: &ProjectId, number: u64) -> Self {
        Self::numbered(project.clone(), ResourceKind::Pull, number)
    }

    #[must_use]
    pub fn pull_commits(project: &ProjectId, number: u64) -> Self {
        Self::numbered(project.clone(), ResourceKind::PullCommits, number)
    }

    #[must_use]
    pub fn commit(project: &ProjectId, sha: &str) -> Self {
        Self {
            project: project.clone(),
            kind: ResourceKind::Commit,
            number: None,
            sub_key: Some(sha.to_string()),
        }
    }

    /// A changed file of commit `sha` in pull request `number`.
    #[must_use]
    pub fn pull_file(project: &ProjectId, number: u64, sha: &str, filename: &str) -> Self {
        Self {
            project: project.clone(),
            kind: ResourceKind::PullFile,
            number: Some(number),
            sub_key: Some(format!("{sha}/{}", flatten_repo_path(filename))),
        }
    }

    /// Path of this snapshot relative to the store root.
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::from(sanitize_path_component(&self.project.namespace()));
        let number = self.number.unwrap_or_default();
        let sub_key = self.sub_key.as_deref().unwrap_or_default();

        match self.kind {
            ResourceKind::Repository => path.push("repo.json"),
            ResourceKind::IssueList => path.push("issues_list.json"),
            ResourceKind::PullList => path.push("pulls_list.json"),
            ResourceKind::Issue => path.push(format!("issue/{number}.json")),
            ResourceKind::Timeline => path.push(format!("timeline/{number}.json")),
            ResourceKind::Pull => path.push(format!("pull/{number}.json")),
            ResourceKind::PullCommits => path.push(format!("PR_commits/{number}.json")),
            ResourceKind::Commit => path.push(format!("commit/{}.json", sanitize_path_component(sub_key))),
            ResourceKind::PullFile => {
                path.push("PR_files");
                path.push(format!("PR_{number}"));
                for part in sub_key.split('/') {
                    path.push(sanitize_path_component(part));
                }
            }
        }

        path
    }
}

impl core::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.project, self.kind)?;
        if let Some(number) = self.number {
            write!(f, " #{number}")?;
        }
        if let Some(sub_key) = &self.sub_key {
            write!(f, " {sub_key}")?;
        }
        Ok(())
    }
}

/// Result of looking up a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The snapshot bytes.
    Present(Vec<u8>),

    /// A previous fetch established that the host has no such resource.
    Missing(String),

    /// Nothing is known about this key yet.
    Absent,
}

/// Storage for raw snapshots.
pub trait Store: Send + Sync + core::fmt::Debug {
    fn lookup(&self, key: &StoreKey) -> Result<Lookup>;

    /// Store the snapshot bytes, replacing any earlier value or missing marker.
    fn put(&self, key: &StoreKey, bytes: &[u8]) -> Result<()>;

    /// Record that the host has no such resource.
    fn put_missing(&self, key: &StoreKey, reason: &str) -> Result<()>;

    /// When the snapshot was written, if present.
    fn modified(&self, key: &StoreKey) -> Option<SystemTime>;

    /// Whether the key was resolved by an earlier run, either way.
    fn contains(&self, key: &StoreKey) -> bool {
        !matches!(self.lookup(key), Ok(Lookup::Absent) | Err(_))
    }
}

/// Directory-backed store.
///
/// Writes go to a temporary file in the destination directory which is then
/// renamed over the final path, so readers never observe a partial snapshot.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).into_app_err_with(|| format!("creating snapshot store at '{}'", root.display()))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_of(&self, key: &StoreKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    fn marker_path(path: &Path) -> PathBuf {
        let mut marker = path.as_os_str().to_owned();
        marker.push(MISSING_SUFFIX);
        PathBuf::from(marker)
    }

    fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
        let parent = path.parent().ok_or_else(|| app_err!("snapshot path '{}' has no parent", path.display()))?;
        fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{}'", parent.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).into_app_err_with(|| format!("creating temporary file in '{}'", parent.display()))?;
        tmp.write_all(bytes).into_app_err_with(|| format!("writing snapshot '{}'", path.display()))?;
        tmp.flush().into_app_err_with(|| format!("flushing snapshot '{}'", path.display()))?;
        let _ = tmp.persist(path).into_app_err_with(|| format!("moving snapshot into place at '{}'", path.display()))?;
        Ok(())
    }
}

impl Store for FsStore {
    fn lookup(&self, key: &StoreKey) -> Result<Lookup> {
        let path = self.path_of(key);
        match fs::read(&path) {
            Ok(bytes) => return Ok(Lookup::Present(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).into_app_err_with(|| format!("reading snapshot '{}'", path.display())),
        }

        let marker = Self::marker_path(&path);
        match fs::read_to_string(&marker) {
            Ok(reason) => Ok(Lookup::Missing(reason)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Lookup::Absent),
            Err(e) => Err(e).into_app_err_with(|| format!("reading marker '{}'", marker.display())),
        }
    }

    fn put(&self, key: &StoreKey, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(key);
        Self::write_atomically(&path, bytes)?;

        let marker = Self::marker_path(&path);
        if marker.exists() {
            fs::remove_file(&marker).into_app_err_with(|| format!("removing marker '{}'", marker.display()))?;
        }

        log::trace!(target: LOG_TARGET, "Stored {key} at '{}'", path.display());
        Ok(())
    }

    fn put_missing(&self, key: &StoreKey, reason: &str) -> Result<()> {
        let path = self.path_of(key);
        Self::write_atomically(&Self::marker_path(&path), reason.as_bytes())?;
        log::trace!(target: LOG_TARGET, "Marked {key} as missing: {reason}");
        Ok(())
    }

    fn modified(&self, key: &StoreKey) -> Option<SystemTime> {
        fs::metadata(self.path_of(key)).and_then(|m| m.modified()).ok()
    }

    fn contains(&self, key: &StoreKey) -> bool {
        let path = self.path_of(key);
        path.exists() || Self::marker_path(&path).exists()
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    lookup: Lookup,
    written: SystemTime,
}

/// In-memory store.
///
/// Modification times come from a write counter rather than the clock, so
/// entries written later always compare as newer.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<(u64, HashMap<StoreKey, MemoryEntry>)>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, key: &StoreKey, lookup: Lookup) {
        let mut guard = self.entries.lock().expect("lock not poisoned");
        guard.0 += 1;
        let written = UNIX_EPOCH + Duration::from_millis(guard.0);
        let _ = guard.1.insert(key.clone(), MemoryEntry { lookup, written });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock not poisoned").1.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn lookup(&self, key: &StoreKey) -> Result<Lookup> {
        let guard = self.entries.lock().expect("lock not poisoned");
        Ok(guard.1.get(key).map_or(Lookup::Absent, |entry| entry.lookup.clone()))
    }

    fn put(&self, key: &StoreKey, bytes: &[u8]) -> Result<()> {
        self.insert(key, Lookup::Present(bytes.to_vec()));
        Ok(())
    }

    fn put_missing(&self, key: &StoreKey, reason: &str) -> Result<()> {
        self.insert(key, Lookup::Missing(reason.to_string()));
        Ok(())
    }

    fn modified(&self, key: &StoreKey) -> Option<SystemTime> {
        let guard = self.entries.lock().expect("lock not poisoned");
        guard.1.get(key).and_then(|entry| matches!(entry.lookup, Lookup::Present(_)).then_some(entry.written))
    }
}
