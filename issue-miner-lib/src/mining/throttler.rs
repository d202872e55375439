use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Gates outbound API requests.
///
/// At most `max_concurrent` requests run at once, and any caller that observes a
/// rate limit can park all further dispatch with [`Throttler::pause_for`]. When
/// pauses overlap, the one ending last wins.
#[derive(Debug)]
pub struct Throttler {
    semaphore: Arc<Semaphore>,
    paused: AtomicBool,
    resume: Notify,
    resume_at: Mutex<Option<Instant>>,
}

impl Throttler {
    /// Minimum extension required for a new pause to override an active one.
    const MIN_PAUSE_EXTENSION: Duration = Duration::from_secs(1);

    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            paused: AtomicBool::new(false),
            resume: Notify::new(),
            resume_at: Mutex::new(None),
        })
    }

    /// Wait for any active pause to end, then take a request slot.
    ///
    /// The slot is released when the returned permit is dropped.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        loop {
            if self.paused.load(Ordering::Acquire) {
                let notified = self.resume.notified();
                if self.paused.load(Ordering::Acquire) {
                    notified.await;
                }
                continue;
            }

            return Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .expect("request semaphore is never closed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Time left before dispatch resumes, if paused.
    pub fn remaining_pause(&self) -> Option<Duration> {
        let guard = self.resume_at.lock().expect("lock not poisoned");
        guard.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Stop dispatching new requests for `duration`.
    ///
    /// Requests already in flight are not interrupted. Returns `false` when a pause
    /// ending at about the same time or later is already active.
    pub fn pause_for(self: &Arc<Self>, duration: Duration) -> bool {
        let until = Instant::now() + duration;

        {
            let mut guard = self.resume_at.lock().expect("lock not poisoned");
            if guard.is_some_and(|active| active + Self::MIN_PAUSE_EXTENSION >= until) {
                return false;
            }
            *guard = Some(until);
        }

        self.paused.store(true, Ordering::Release);

        let this = Arc::clone(self);
        drop(tokio::spawn(async move {
            tokio::time::sleep(duration).await;

            let expired = {
                let mut guard = this.resume_at.lock().expect("lock not poisoned");
                if guard.is_some_and(|at| Instant::now() >= at) {
                    *guard = None;
                    true
                } else {
                    false
                }
            };

            if expired {
                this.paused.store(false, Ordering::Release);
                this.resume.notify_waiters();
            }
        }));

        true
    }
}
