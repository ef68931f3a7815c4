//! Pacing gate between the scheduler and whoever plays the turns back.
//!
//! The scheduler takes the gate before every turn and leaves it closed. It is
//! reopened from outside once the previous turn has finished playing, or by a
//! stop request.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug)]
pub struct PacingGate {
    open: AtomicBool,
    notify: Notify,
}

impl PacingGate {
    /// A new gate starts open so the first turn can run immediately.
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            notify: Notify::new(),
        }
    }

    /// Wait until the gate is open, then close it.
    ///
    /// Exactly one waiter passes per `open()`.
    pub async fn wait_and_close(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so an open() in between is not lost.
            notified.as_mut().enable();

            if self
                .open
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }

            notified.await;
        }
    }

    /// Open the gate. Opening an open gate does nothing.
    pub fn open(&self) {
        self.open.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Default for PacingGate {
    fn default() -> Self {
        Self::new()
    }
}
