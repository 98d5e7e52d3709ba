//! Shutdown triggers.
//!
//! The orchestrator blocks on a [`ShutdownSource`] instead of polling. In production that
//! is an [`InterruptListener`] on SIGINT/SIGTERM; tests and embedders can use the
//! receiving half of a `tokio::sync::mpsc` channel.

use crate::framework::LoadTestError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Something that can ask the load test to shut down, possibly more than once.
#[async_trait]
pub trait ShutdownSource: Send + 'static {
    /// Waits for the next shutdown request.
    ///
    /// Returns `false` once no further request can ever arrive.
    async fn requested(&mut self) -> bool;
}

#[async_trait]
impl ShutdownSource for mpsc::Receiver<()> {
    async fn requested(&mut self) -> bool {
        self.recv().await.is_some()
    }
}

/// OS interrupt and termination signals.
///
/// Installing replaces the default "terminate the process" disposition, so repeated
/// interrupts are delivered here instead of killing the process mid-shutdown.
pub struct InterruptListener {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl InterruptListener {
    /// Registers the handlers. Failing here is fatal: without it the load test could
    /// never be stopped cleanly.
    #[cfg(unix)]
    pub fn install() -> Result<Self, LoadTestError> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).map_err(LoadTestError::SignalHandler)?,
            terminate: signal(SignalKind::terminate()).map_err(LoadTestError::SignalHandler)?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self, LoadTestError> {
        Ok(Self {})
    }
}

#[async_trait]
impl ShutdownSource for InterruptListener {
    async fn requested(&mut self) -> bool {
        #[cfg(unix)]
        let requested = tokio::select! {
            signal = self.interrupt.recv() => signal.is_some(),
            signal = self.terminate.recv() => signal.is_some(),
        };
        #[cfg(not(unix))]
        let requested = tokio::signal::ctrl_c().await.is_ok();
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source() {
        let (tx, mut rx) = mpsc::channel(2);
        tx.send(()).await.unwrap();
        assert!(rx.requested().await);
        drop(tx);
        assert!(!rx.requested().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interrupt_listener_installs() {
        assert!(InterruptListener::install().is_ok());
    }
}
