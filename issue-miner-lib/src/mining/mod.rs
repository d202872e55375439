//! Data acquisition, storage, and the pipeline components.
//!
//! # Implementation Model
//!
//! Everything the host returns is kept in a [`Store`] as the exact response
//! bytes, keyed by project, resource kind and number. [`Snapshots`] pairs the
//! store with an [`ApiClient`] and only goes to the network for keys the store
//! knows nothing about, which is what makes every stage safe to rerun.
//!
//! The components then run over those snapshots, stage by stage:
//!
//! - [`RepositoryFilter`] selects candidate repositories from a metadata feed
//! - [`IssuePRCrawler`] stores issues, timelines, pull requests, commits and files
//! - [`linker`] turns timeline cross-references into issue to pull request links
//! - [`eligibility`] keeps closed issues with a merged pull request
//! - [`MLContentClassifier`] labels issues by framework imports and title keywords
//! - [`DatasetSampler`] draws a per-project balanced non-ML counterpart set
//! - [`MetricsExtractor`] measures line change and fix duration per record
//!
//! Long-running stages persist a [`Checkpoint`] so an interrupted run resumes
//! where it stopped. The [`Throttler`] gates all requests so a rate-limit pause
//! applies to every in-flight worker at once.

mod checkpoint;
pub mod classifier;
mod client;
pub mod crawler;
pub mod eligibility;
mod fetch;
pub mod linker;
pub mod metrics;
mod path_utils;
mod progress;
mod project;
pub mod repo_filter;
pub(crate) mod resilient_http;
pub mod sampler;
mod snapshots;
mod stage_tracker;
mod store;
mod store_lock;
mod throttler;
pub mod wire;

pub use checkpoint::Checkpoint;
pub use classifier::{CommitOrder, Glossary, MLContentClassifier};
pub use client::{ApiClient, ApiResult, ClientConfig, RateLimitInfo};
pub use crawler::{CrawlStats, IssuePRCrawler};
pub use fetch::Fetch;
pub use metrics::MetricsExtractor;
pub use progress::{Progress, SilentProgress, Status, StatusSource};
pub use project::ProjectId;
pub use repo_filter::{FilterCriteria, RepositoryFilter};
pub use resilient_http::RetryPolicy;
pub use sampler::DatasetSampler;
pub use snapshots::Snapshots;
pub use stage_tracker::{StageTracker, TrackedItem};
pub use store::{FsStore, Lookup, MemoryStore, ResourceKind, Store, StoreKey};
pub use store_lock::{StoreLockGuard, lock_store};
pub use throttler::Throttler;
