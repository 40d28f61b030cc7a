//! Per-selection completion latch.
//!
//! A selection whose server principal is unknown at insertion time owns a
//! single-shot latch that a background resolver signals once the principal
//! is written. Waiters observe either completion or cancellation, never a
//! torn state: the name fields are mutated only before the signal and read
//! only after, so the latch is the sole release-store between resolver and
//! reader.

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Internal latch state. Transitions: Pending -> Done (signal),
/// any -> Cancelled (cancel; sticky).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LatchState {
    Pending,
    Done,
    Cancelled,
}

/// One-shot completion event with sticky cancellation.
#[derive(Debug)]
pub(crate) struct CompletionLatch {
    state: Mutex<LatchState>,
    notify: Notify,
}

impl CompletionLatch {
    /// A latch that still awaits its resolver.
    pub(crate) fn pending() -> Self {
        Self {
            state: Mutex::new(LatchState::Pending),
            notify: Notify::new(),
        }
    }

    /// A latch for a selection whose server was known at insertion.
    pub(crate) fn signalled() -> Self {
        Self {
            state: Mutex::new(LatchState::Done),
            notify: Notify::new(),
        }
    }

    /// Release all waiters with success. Idempotent; a cancelled latch
    /// stays cancelled.
    pub(crate) fn signal(&self) {
        {
            let mut state = self.state.lock();
            if *state != LatchState::Pending {
                return;
            }
            *state = LatchState::Done;
        }
        self.notify.notify_waiters();
    }

    /// Release all waiters with failure. Sticky: overrides both pending and
    /// completed states so late waiters also observe failure.
    pub(crate) fn cancel(&self) {
        {
            let mut state = self.state.lock();
            if *state == LatchState::Cancelled {
                return;
            }
            *state = LatchState::Cancelled;
        }
        self.notify.notify_waiters();
    }

    /// Whether the latch was cancelled.
    pub(crate) fn is_cancelled(&self) -> bool {
        *self.state.lock() == LatchState::Cancelled
    }

    /// Whether the latch already completed successfully.
    pub(crate) fn is_signalled(&self) -> bool {
        *self.state.lock() == LatchState::Done
    }

    /// Block the caller until the latch settles. Returns `true` on
    /// completion and `false` on cancellation.
    pub(crate) async fn wait(&self) -> bool {
        loop {
            // Enable the waiter before reading the state: `notify_waiters`
            // only reaches futures already registered, so a signal landing
            // between the read and the await must still wake us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            match *self.state.lock() {
                LatchState::Done => return true,
                LatchState::Cancelled => return false,
                LatchState::Pending => {}
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_pre_signalled_latch_completes_immediately() {
        let latch = CompletionLatch::signalled();
        assert!(latch.wait().await);
        assert!(latch.is_signalled());
    }

    #[tokio::test]
    async fn test_signal_releases_waiter() {
        let latch = Arc::new(CompletionLatch::pending());
        let waiter = {
            let latch = Arc::clone(&latch);
            tokio::spawn(async move { latch.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        latch.signal();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_releases_waiter_with_failure() {
        let latch = Arc::new(CompletionLatch::pending());
        let waiter = {
            let latch = Arc::clone(&latch);
            tokio::spawn(async move { latch.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        latch.cancel();
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_is_sticky_over_signal() {
        let latch = CompletionLatch::pending();
        latch.cancel();
        latch.signal();
        assert!(latch.is_cancelled());
        assert!(!latch.wait().await);
    }

    #[tokio::test]
    async fn test_cancel_overrides_completed_latch() {
        let latch = CompletionLatch::signalled();
        latch.cancel();
        assert!(!latch.wait().await);
    }

    #[tokio::test]
    async fn test_signal_is_idempotent() {
        let latch = CompletionLatch::pending();
        latch.signal();
        latch.signal();
        assert!(latch.wait().await);
    }
}
