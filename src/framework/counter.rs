//! # Completion Counter
//!
//! A countdown latch: the orchestrator registers pending work with [`CompletionCounter::add`],
//! every unit of work acknowledges with [`CompletionCounter::done`], and
//! [`CompletionCounter::wait`] resolves once the count is back at zero.
//!
//! ## Exactly-once acknowledgement
//!
//! Entities never call `done` by hand. They arm a [`CompletionGuard`] when they start and
//! the guard acknowledges when it is dropped. Dropping happens on every exit path of the
//! entity's task (normal return, early return on error, panic unwinding), and it happens
//! *after* the execution loop has exited, never when the stop signal is merely observed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::error;

/// Misuse of a [`CompletionCounter`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CounterError {
    /// `done` was called with no pending completion registered.
    #[error("completion acknowledged with nothing pending")]
    Underflow,
}

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicUsize,
    zero: Notify,
}

/// Shared count of scheduled units of work that have not finished yet.
///
/// Cloning shares the same counter.
#[derive(Clone, Debug, Default)]
pub struct CompletionCounter {
    inner: Arc<Inner>,
}

impl CompletionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `n` pending completions.
    pub fn add(&self, n: usize) {
        self.inner.pending.fetch_add(n, Ordering::SeqCst);
    }

    /// Acknowledges one completion.
    ///
    /// Never wraps below zero: acknowledging with nothing pending is reported as
    /// [`CounterError::Underflow`] and leaves the counter untouched.
    pub fn done(&self) -> Result<(), CounterError> {
        let previous = self
            .inner
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_err(|_| CounterError::Underflow)?;
        if previous == 1 {
            self.inner.zero.notify_waiters();
        }
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Resolves once every registered completion has been acknowledged.
    ///
    /// Resolves immediately if nothing is pending.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.zero.notified();
            tokio::pin!(notified);
            // Register interest before checking, otherwise a `done` landing between the
            // check and the await would be lost.
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Arms a guard that acknowledges one completion when dropped.
    ///
    /// The matching `add` must already have happened.
    pub fn guard(&self) -> CompletionGuard {
        CompletionGuard {
            counter: self.clone(),
        }
    }
}

/// Acknowledges one completion on drop.
#[must_use = "dropping the guard immediately acknowledges completion"]
#[derive(Debug)]
pub struct CompletionGuard {
    counter: CompletionCounter,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.counter.done() {
            error!(error = %e, "Completion guard dropped without a registered completion");
        }
    }
}
