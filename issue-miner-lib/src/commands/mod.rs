//! Command-line interface and orchestration for issue-miner
//!
//! This module implements the CLI commands and drives the mining components
//! stage by stage, from the repository feed to the final dataset. It handles
//! argument parsing, configuration management, and the per-stage workflows.
//!
//! # Implementation Model
//!
//! ## Commands
//!
//! - **repos**: Filter a bulk metadata feed down to the candidate repositories
//! - **crawl**: Store every issue and timeline of the candidates
//! - **link**: Pair issues with the pull requests that cross-reference them
//! - **pulls**: Keep closed issues with a merged pull request and store the
//!   changed source files of those pull requests
//! - **classify**: Label each eligible issue `ml` or `non-ml`
//! - **sample**: Draw a per-project balanced comparison set
//! - **metrics**: Compute line change and fix duration for the final dataset
//! - **pipeline**: All of the above, in order
//! - **glossary**: Turn a saved ML glossary page into a keyword list
//! - **init**: Generate a default configuration file
//!
//! ## Execution Flow
//!
//! The `run` function parses command-line arguments using clap and routes to
//! the appropriate command handler. A stage command builds a shared `Common` context
//! (logging, configuration, a locked snapshot store and the API client), reads
//! the previous stage's CSV artifact, does its work and writes its own artifact,
//! then prints a one-line summary.
//!
//! The network stages (`repos`, `crawl`, `pulls`) keep a checkpoint under
//! `<data-dir>/checkpoints`, so an interrupted run picks up where it stopped.

mod classify;
mod common;
mod config;
mod crawl;
mod glossary;
mod host;
mod init;
mod link;
mod metrics;
mod pipeline;
mod progress_reporter;
mod pulls;
mod repos;
mod run;
mod sample;

#[cfg(debug_assertions)]
pub use config::Config;

pub use classify::{ClassifyArgs, process_classify};
pub use common::{ColorMode, CommonArgs, LogLevel};
pub use crawl::{CrawlArgs, process_crawl};
pub use glossary::{GlossaryArgs, extract_glossary};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use link::{LinkArgs, process_link};
pub use metrics::{MetricsArgs, process_metrics};
pub use pipeline::{PipelineArgs, process_pipeline};
pub use progress_reporter::ProgressReporter;
pub use pulls::{PullsArgs, process_pulls};
pub use repos::{ReposArgs, process_repos};
pub use run::run;
pub use sample::{SampleArgs, process_sample};
