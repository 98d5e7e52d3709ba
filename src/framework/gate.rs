//! # One-Shot Gates
//!
//! Two coordination primitives share the same shape: a flag that flips exactly once
//! and that any number of tasks can wait on.
//!
//! - [`StopSignal`] - broadcast-once cancellation. Closed by the orchestrator, observed by
//!   every entity.
//! - [`ReleaseBarrier`] - holds spawned entity tasks until every entity has been
//!   constructed, so stagger delays share one baseline.
//!
//! Both are backed by a [`tokio::sync::watch`] channel holding the instant the gate
//! flipped. A watch channel keeps its last value, so a task that subscribes *after* the
//! gate opened still sees it open. Nothing is ever "missed".

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// Shared one-shot gate. Cloning shares the same underlying flag.
#[derive(Clone, Debug)]
struct Gate {
    sender: Arc<watch::Sender<Option<Instant>>>,
}

impl Gate {
    fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Flips the gate. Returns `true` only for the call that actually flipped it.
    fn open(&self) -> bool {
        self.sender.send_if_modified(|opened| {
            if opened.is_some() {
                false
            } else {
                *opened = Some(Instant::now());
                true
            }
        })
    }

    fn is_open(&self) -> bool {
        self.sender.borrow().is_some()
    }

    fn opened_at(&self) -> Option<Instant> {
        *self.sender.borrow()
    }

    async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = receiver.wait_for(Option::is_some).await;
    }
}

// =============================================================================
// STOP SIGNAL
// =============================================================================

/// Broadcast-once stop notification observed cooperatively by every entity.
///
/// `close()` may be called any number of times. Only the first call has an effect and
/// there is no way to reopen the signal.
///
/// ```rust
/// use entity_swarm::framework::StopSignal;
///
/// # #[tokio::main] async fn main() {
/// let stop = StopSignal::new();
/// assert!(stop.close());
/// assert!(!stop.close()); // already closed, no-op
/// stop.closed().await;    // resolves immediately
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct StopSignal {
    gate: Gate,
}

impl StopSignal {
    pub fn new() -> Self {
        Self { gate: Gate::new() }
    }

    /// Closes the signal. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.gate.open()
    }

    pub fn is_closed(&self) -> bool {
        self.gate.is_open()
    }

    /// Resolves once the signal is closed.
    pub async fn closed(&self) {
        self.gate.wait().await
    }

    pub fn closed_at(&self) -> Option<Instant> {
        self.gate.opened_at()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RELEASE BARRIER
// =============================================================================

/// Holds entity tasks at a ready-but-not-running state until the orchestrator has
/// finished scheduling every entity.
#[derive(Clone, Debug)]
pub struct ReleaseBarrier {
    gate: Gate,
}

impl ReleaseBarrier {
    pub fn new() -> Self {
        Self { gate: Gate::new() }
    }

    /// Releases every waiting task. Returns `false` if the barrier was already open.
    pub fn open(&self) -> bool {
        self.gate.open()
    }

    /// The common baseline that stagger delays are measured from.
    pub fn opened_at(&self) -> Option<Instant> {
        self.gate.opened_at()
    }

    pub async fn wait(&self) {
        self.gate.wait().await
    }
}

impl Default for ReleaseBarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_signal_close_is_idempotent() {
        let stop = StopSignal::new();
        assert!(!stop.is_closed());
        assert!(stop.closed_at().is_none());

        assert!(stop.close());
        let first = stop.closed_at();
        assert!(!stop.close());
        assert!(stop.is_closed());
        assert_eq!(stop.closed_at(), first, "second close must not move the timestamp");
    }

    #[tokio::test]
    async fn test_stop_signal_wakes_all_waiters() {
        let stop = StopSignal::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stop = stop.clone();
            handles.push(tokio::spawn(async move { stop.closed().await }));
        }

        tokio::task::yield_now().await;
        stop.close();

        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("waiter not woken")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_closed_signal() {
        let stop = StopSignal::new();
        stop.close();
        let late = stop.clone();
        tokio::time::timeout(Duration::from_millis(50), late.closed())
            .await
            .expect("late subscriber blocked on an already closed signal");
    }

    #[tokio::test(start_paused = true)]
    async fn test_barrier_holds_until_open() {
        let barrier = ReleaseBarrier::new();
        let waiter = {
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                Instant::now()
            })
        };

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!waiter.is_finished());

        assert!(barrier.open());
        assert!(!barrier.open());
        let released = waiter.await.unwrap();
        assert_eq!(Some(released), barrier.opened_at());
    }
}
