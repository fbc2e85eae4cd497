//! Cancellable Waits
//!
//! Every blocking point in a trial (page-load wait, measurement window,
//! inter-trial cooldown) must stay responsive to an external cancellation
//! signal so in-flight subprocesses can be stopped and partial results
//! recorded. Waits are sliced into short polls of a shared flag instead of
//! one long sleep.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How finely blocking waits poll for cancellation.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Process-wide interrupt latch, set from the SIGINT handler. Signal
/// handlers cannot reach into an `Arc`, so the latch is a plain static that
/// every [`CancelFlag`] also observes.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Record an external interrupt (called from the signal handler).
pub fn note_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Whether an external interrupt has been recorded.
pub fn interrupt_requested() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Shared cancellation flag with sliced, interruptible sleeps.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    /// A fresh, uncancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once this flag was cancelled or a process-wide interrupt was
    /// recorded.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || interrupt_requested()
    }

    /// Sleep for `duration`, waking early on cancellation.
    ///
    /// Returns `true` when the full duration elapsed, `false` when the wait
    /// was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            std::thread::sleep(remaining.min(POLL_SLICE));
        }
    }
}
