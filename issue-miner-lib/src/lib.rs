#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for issue-miner
//!
//! This library consolidates all functionality for the issue-miner tool, which mines
//! hosted repositories for issues fixed by merged pull requests, labels the ones whose
//! fixes touch machine-learning framework code, and produces a per-project balanced
//! ML/non-ML dataset with fix metrics.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and stage orchestration
//! - [`mining`]: API access, snapshot storage, and the pipeline components
//! - [`artifacts`]: Typed CSV rows exchanged between stages

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

#[cfg(any(debug_assertions, test))]
pub mod artifacts;
#[cfg(not(any(debug_assertions, test)))]
mod artifacts;

#[cfg(any(debug_assertions, test))]
pub mod mining;
#[cfg(not(any(debug_assertions, test)))]
mod mining;

pub use crate::commands::{Host, run};
