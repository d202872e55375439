use crate::mining::{Progress, Status, StatusSource};
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_millis(100);

const SPINNER_FRAMES: &[&str] = &[
    "<=>                      ",
    "     <=>                 ",
    "          <=>            ",
    "               <=>       ",
    "                    <=>  ",
    "               <=>       ",
    "          <=>            ",
    "     <=>                 ",
];

/// Which indicator a phase uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Look {
    Bar,
    Spinner,
}

impl Look {
    const fn of(status: &Status) -> Self {
        if status.bar.is_some() { Self::Bar } else { Self::Spinner }
    }

    fn style(self, use_colors: bool) -> ProgressStyle {
        let prefix = if use_colors { "{prefix:>12.bold.cyan}" } else { "{prefix:>12}" };
        let result = match self {
            Self::Bar => ProgressStyle::default_bar()
                .template(&format!("{prefix} [{{bar:25}}] {{msg}}"))
                .map(|style| style.progress_chars("=> ")),
            Self::Spinner => ProgressStyle::default_spinner()
                .template(&format!("{prefix} [{{spinner}}] {{msg}}"))
                .map(|style| style.tick_strings(SPINNER_FRAMES)),
        };
        result.expect("could not create progress bar style")
    }
}

/// The current phase, as read by the refresh task.
struct Phase {
    source: StatusSource,
    look: Look,
    started: Instant,
}

struct Shared {
    show_at: Instant,
    shown: AtomicBool,
    phase: Mutex<Phase>,
}

/// A stderr progress bar for the mining stages.
///
/// The bar stays hidden until `delay` has passed, so short stages and runs with
/// logging enabled do not flicker a bar over the log lines.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    shared: Arc<Shared>,
    refresher: Arc<JoinHandle<()>>,
    use_colors: bool,
}

impl ProgressReporter {
    /// Must be called from within a tokio runtime; the bar is refreshed by a background task.
    #[must_use]
    pub fn new(delay: Duration, use_colors: bool) -> Self {
        let bar = ProgressBar::hidden();
        let shared = Arc::new(Shared {
            show_at: Instant::now() + delay,
            shown: AtomicBool::new(false),
            phase: Mutex::new(Phase {
                source: Box::new(Status::default),
                look: Look::Spinner,
                started: Instant::now(),
            }),
        });

        Self {
            refresher: Arc::new(tokio::spawn(refresh(bar.clone(), Arc::clone(&shared)))),
            bar,
            shared,
            use_colors,
        }
    }
}

impl Progress for ProgressReporter {
    fn begin(&self, phase: &str, source: StatusSource) {
        let look = Look::of(&source());
        *self.shared.phase.lock().expect("lock poisoned") = Phase {
            source,
            look,
            started: Instant::now(),
        };

        self.bar.set_prefix(phase.to_string());
        self.bar.set_style(look.style(self.use_colors));
        match look {
            Look::Bar => {
                self.bar.disable_steady_tick();
                self.bar.set_length(0);
                self.bar.set_position(0);
            }
            Look::Spinner => self.bar.enable_steady_tick(TICK),
        }
    }

    fn println(&self, msg: &str) {
        self.bar.suspend(|| eprintln!("{msg}"));
    }

    fn done(&self) {
        if self.shared.shown.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }

    fn use_colors(&self) -> bool {
        self.use_colors
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        // Clones share the task; only the last one stops it.
        if Arc::strong_count(&self.refresher) == 1 {
            self.refresher.abort();
        }
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("bar", &self.bar)
            .field("shown", &self.shared.shown)
            .field("use_colors", &self.use_colors)
            .finish_non_exhaustive()
    }
}

async fn refresh(bar: ProgressBar, shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(TICK);
    #[expect(clippy::infinite_loop, reason = "task runs until aborted")]
    loop {
        let _ = interval.tick().await;

        if !shared.shown.load(Ordering::Relaxed) {
            if Instant::now() < shared.show_at {
                continue;
            }
            shared.shown.store(true, Ordering::Relaxed);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        }

        let (status, look, elapsed) = {
            let phase = shared.phase.lock().expect("lock poisoned");
            ((phase.source)(), phase.look, phase.started.elapsed())
        };

        match (look, status.bar) {
            (Look::Bar, Some((done, total))) if total > 0 => {
                bar.set_length(total);
                bar.set_position(done);
                bar.set_message(status.message);
            }
            (Look::Bar, _) => bar.set_message(status.message),
            (Look::Spinner, _) => bar.set_message(format!("{}s: {}", elapsed.as_secs(), status.message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_follows_status() {
        assert_eq!(Look::of(&Status::spinner("loading")), Look::Spinner);
        assert_eq!(
            Look::of(&Status {
                bar: Some((0, 0)),
                message: String::new(),
            }),
            Look::Bar
        );
    }

    #[test]
    fn test_styles_build() {
        for look in [Look::Bar, Look::Spinner] {
            let _ = look.style(true);
            let _ = look.style(false);
        }
    }

    #[tokio::test]
    async fn test_begin_swaps_phase() {
        let reporter = ProgressReporter::new(Duration::from_secs(3600), false);
        reporter.begin("Reading", Box::new(|| Status::spinner("feed")));
        reporter.begin(
            "Crawling",
            Box::new(|| Status {
                bar: Some((1, 2)),
                message: "1/2 projects".to_string(),
            }),
        );

        let phase = reporter.shared.phase.lock().unwrap();
        assert_eq!(phase.look, Look::Bar);
        assert_eq!((phase.source)().bar, Some((1, 2)));
        drop(phase);
        reporter.done();
    }
}
