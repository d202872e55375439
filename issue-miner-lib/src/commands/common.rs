//! Setup shared by every stage command.

use super::Host;
use super::ProgressReporter;
use super::config::Config;
use crate::Result;
use crate::mining::{
    ApiClient, Checkpoint, FsStore, Progress, Snapshots, StageTracker, Store, StoreLockGuard, lock_store,
};
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use core::fmt::Display;
use core::time::Duration;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by every stage command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Directory holding the CSV artifacts passed between stages
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub data_dir: Utf8PathBuf,

    /// Directory of the snapshot store (default is `<data-dir>/cache`)
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Path to configuration file (default is `<data-dir>/miner.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,

    /// Forget saved stage progress and start again from the first input row
    #[arg(long)]
    pub restart: bool,
}

/// Everything a stage needs: configuration, the snapshot store, and somewhere to report to.
pub struct Common<'a, H: Host> {
    pub config: Config,
    pub data_dir: Utf8PathBuf,
    pub snapshots: Snapshots,
    pub progress: Arc<dyn Progress>,
    restart: bool,
    host: &'a mut H,
    _store_lock: StoreLockGuard,
}

impl<H: Host> core::fmt::Debug for Common<'_, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Common")
            .field("data_dir", &self.data_dir)
            .field("snapshots", &self.snapshots)
            .field("restart", &self.restart)
            .finish_non_exhaustive()
    }
}

impl<'a, H: Host> Common<'a, H> {
    /// Set up logging, load the configuration, and open and lock the snapshot store.
    pub async fn new(host: &'a mut H, args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let config = Config::load(&args.data_dir, args.config.as_ref())?;

        let cache_dir = args.cache_dir.clone().unwrap_or_else(|| args.data_dir.join("cache"));
        let store = FsStore::open(cache_dir.as_std_path())?;
        let store_lock = lock_store(store.root()).await?;

        // Progress bars and log lines fight over stderr; with logging on, the bar never shows.
        let delay = if args.log_level == LogLevel::None {
            Duration::from_millis(300)
        } else {
            Duration::from_hours(365 * 24)
        };

        let use_colors = match args.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                use std::io::{IsTerminal, stderr};
                stderr().is_terminal()
            }
        };

        let progress: Arc<dyn Progress> = Arc::new(ProgressReporter::new(delay, use_colors));
        let client = ApiClient::new(config.api.client_config(args.github_token.clone()), Arc::clone(&progress))?;
        let store: Arc<dyn Store> = Arc::new(store);

        Ok(Self {
            config,
            data_dir: args.data_dir.clone(),
            snapshots: Snapshots::new(client, store),
            progress,
            restart: args.restart,
            host,
            _store_lock: store_lock,
        })
    }

    /// Path of a stage artifact in the data directory.
    #[must_use]
    pub fn artifact(&self, name: &str) -> PathBuf {
        self.data_dir.join(name).into_std_path_buf()
    }

    /// The persisted cursor of a network stage over `input_rows` rows.
    pub fn checkpoint(&self, stage: &str, input_rows: usize) -> Result<Checkpoint> {
        Checkpoint::open(self.data_dir.join("checkpoints").as_std_path(), stage, input_rows, self.restart)
    }

    /// A progress tracker for a new phase, aware of rate-limit pauses.
    #[must_use]
    pub fn tracker(&self, phase: &str) -> StageTracker {
        StageTracker::new(phase, &self.progress, Some(Arc::clone(self.snapshots.client().throttler())))
    }

    /// Number of repositories worked on at once.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.config.api.max_concurrent_repositories.max(1)
    }

    /// Print a stage summary line.
    pub fn report(&mut self, line: impl Display) {
        let _ = writeln!(self.host.output(), "{line}");
    }
}

/// Initialize logger based on log level
///
/// `RUST_LOG`, when set, takes precedence over the level.
pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // A second stage in the same process keeps the first one's logger.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}

/// Split rows into runs of consecutive rows that share a key.
///
/// Returns half-open index ranges in input order.
pub fn runs_by<T, K: PartialEq>(rows: &[T], key: impl Fn(&T) -> K) -> Vec<core::ops::Range<usize>> {
    let mut runs: Vec<core::ops::Range<usize>> = Vec::new();
    let mut current: Option<K> = None;

    for (index, row) in rows.iter().enumerate() {
        let k = key(row);
        let continues = current.as_ref().is_some_and(|prev| *prev == k);
        if continues && let Some(run) = runs.last_mut() {
            run.end = index + 1;
        } else {
            runs.push(index..index + 1);
        }
        current = Some(k);
    }

    runs
}
