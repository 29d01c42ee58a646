// src/miner/cancel.rs
//! Broadcast-once cancellation
//!
//! A [`CancelToken`] is an atomic flag paired with a channel whose single
//! sender is dropped on cancellation. Every clone of the receiver then sees
//! a disconnect at the same time, so any number of stages blocked in
//! `select!` wake up together. The flag is for cheap polling inside hot
//! loops.

use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared, clonable cancellation signal
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    trigger: ArcSwapOption<Sender<()>>,
    signal: Receiver<()>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state
    pub fn new() -> Self {
        let (trigger, signal) = crossbeam_channel::bounded(0);
        CancelToken {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: ArcSwapOption::from_pointee(trigger),
                signal,
            }),
        }
    }

    /// Cancels the token; idempotent
    ///
    /// Returns true only for the call that performed the transition.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Dropping the only sender disconnects every receiver.
        self.inner.trigger.store(None);
        true
    }

    /// Whether [`cancel`](Self::cancel) has been called
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver that becomes ready (disconnected) once the token is cancelled
    ///
    /// Nothing is ever sent on it; use it as a `select!` arm.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Returns a guard that cancels this token when dropped
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels its token when dropped, including during a panic unwind
pub struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
