//! Per-item progress tracking for pipeline stages.

use super::progress::{Progress, Status};
use super::throttler::Throttler;
use core::sync::atomic::{AtomicU64, Ordering};
use owo_colors::OwoColorize;
use std::sync::Arc;

/// Kinds of work items a stage reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrackedItem {
    Projects,
    Issues,
    Pulls,
    Files,
}

impl TrackedItem {
    const fn name(self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Issues => "issues",
            Self::Pulls => "pulls",
            Self::Files => "files",
        }
    }

    const fn all() -> [Self; 4] {
        [Self::Projects, Self::Issues, Self::Pulls, Self::Files]
    }

    const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
struct ItemCounter {
    total: AtomicU64,
    done: AtomicU64,
}

/// Counts planned and finished items and feeds the progress indicator.
///
/// When a throttler is attached, the progress message also shows whether
/// dispatch is paused on a rate limit.
#[derive(Clone)]
pub struct StageTracker {
    counters: Arc<[ItemCounter; 4]>,
    progress: Arc<dyn Progress>,
}

impl core::fmt::Debug for StageTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StageTracker")
            .field("counters", &self.counters)
            .field("progress", &"<dyn Progress>")
            .finish()
    }
}

impl StageTracker {
    #[must_use]
    pub fn new(phase: &str, progress: &Arc<dyn Progress>, throttler: Option<Arc<Throttler>>) -> Self {
        let counters: Arc<[ItemCounter; 4]> = Arc::default();

        let for_callback = Arc::clone(&counters);
        let use_colors = progress.use_colors();
        progress.begin(phase, Box::new(move || Self::render(&for_callback, throttler.as_deref(), use_colors)));

        Self {
            counters,
            progress: Arc::clone(progress),
        }
    }

    pub fn println(&self, msg: &str) {
        self.progress.println(msg);
    }

    pub fn add(&self, item: TrackedItem, count: u64) {
        let _ = self.counters[item.index()].total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn complete(&self, item: TrackedItem) {
        let _ = self.counters[item.index()].done.fetch_add(1, Ordering::Relaxed);
    }

    /// The (done, total) pair for an item kind.
    #[must_use]
    pub fn position(&self, item: TrackedItem) -> (u64, u64) {
        let counter = &self.counters[item.index()];
        (counter.done.load(Ordering::Relaxed), counter.total.load(Ordering::Relaxed))
    }

    pub fn finish(&self) {
        self.progress.done();
    }

    fn render(counters: &[ItemCounter; 4], throttler: Option<&Throttler>, use_colors: bool) -> Status {
        let mut total = 0u64;
        let mut done = 0u64;
        let mut parts = Vec::with_capacity(TrackedItem::all().len() + 1);

        for item in TrackedItem::all() {
            let counter = &counters[item.index()];
            let item_total = counter.total.load(Ordering::Relaxed);
            let item_done = counter.done.load(Ordering::Relaxed);
            if item_total == 0 {
                continue;
            }

            // The bar length follows the outermost item kind in use.
            if total == 0 {
                total = item_total;
                done = item_done;
            }

            let text = format!("{item_done}/{item_total} {}", item.name());
            if use_colors && item_done >= item_total {
                parts.push(format!("{}", text.green()));
            } else {
                parts.push(text);
            }
        }

        if let Some(left) = throttler.and_then(Throttler::remaining_pause) {
            let text = format!("rate limited, resuming in {}s", left.as_secs());
            if use_colors {
                parts.push(format!("{}", text.yellow()));
            } else {
                parts.push(text);
            }
        }

        let message = if parts.is_empty() { "Nothing to do".to_string() } else { parts.join(", ") };
        Status {
            bar: Some((done, total)),
            message,
        }
    }
}
