/// What a progress indicator shows for the running phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    /// Finished and planned units; `None` shows a spinner instead of a bar.
    pub bar: Option<(u64, u64)>,
    pub message: String,
}

impl Status {
    #[must_use]
    pub fn spinner(message: impl Into<String>) -> Self {
        Self {
            bar: None,
            message: message.into(),
        }
    }
}

/// Polled by the indicator for the current [`Status`].
pub type StatusSource = Box<dyn Fn() -> Status + Send + Sync + 'static>;

/// Receives progress updates from long-running pipeline stages.
pub trait Progress: Send + Sync {
    /// Start a phase such as "Crawling". The kind of indicator follows the
    /// first status `source` reports.
    fn begin(&self, phase: &str, source: StatusSource);

    /// Print a message line without disrupting the progress indicator.
    fn println(&self, msg: &str);

    /// Finish and clear the progress indicator.
    fn done(&self);

    /// Whether progress output may use ANSI colors.
    fn use_colors(&self) -> bool {
        false
    }
}

/// A progress sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl Progress for SilentProgress {
    fn begin(&self, _phase: &str, _source: StatusSource) {}
    fn println(&self, _msg: &str) {}
    fn done(&self) {}
}
