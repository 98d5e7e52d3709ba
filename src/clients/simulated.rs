//! In-process stand-in for the target service.
//!
//! Lets the binary exercise the full entity lifecycle without a server: calls take a
//! fixed latency, every `fail_every`-th REST call fails, and the event stream emits a
//! synthetic `posted` event at a fixed interval.

use super::transport::{EntityTransport, ServerEvent, TransportError, TransportProvider};
use crate::model::{ConnectionConfig, SimulatedConfig, UserIdentity};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct SimulatedTransport {
    username: String,
    latency: Duration,
    fail_every: u64,
    event_interval: Duration,
    calls: AtomicU64,
    events: AtomicU64,
}

impl SimulatedTransport {
    pub fn new(settings: &SimulatedConfig, user: &UserIdentity) -> Self {
        Self {
            username: user.username.clone(),
            latency: Duration::from_millis(settings.latency_milliseconds),
            fail_every: settings.fail_every,
            event_interval: Duration::from_millis(settings.event_interval_milliseconds),
            calls: AtomicU64::new(0),
            events: AtomicU64::new(0),
        }
    }

    async fn call(&self) -> Result<u64, TransportError> {
        tokio::time::sleep(self.latency).await;
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_every > 0 && n % self.fail_every == 0 {
            return Err(TransportError::Simulated(format!(
                "call {} for {} rejected",
                n, self.username
            )));
        }
        Ok(n)
    }
}

#[async_trait]
impl EntityTransport for SimulatedTransport {
    async fn create_post(&self, _channel_id: &str, _message: &str) -> Result<(), TransportError> {
        self.call().await.map(|_| ())
    }

    async fn recent_posts(&self, _channel_id: &str, limit: usize) -> Result<usize, TransportError> {
        let n = self.call().await?;
        Ok((n as usize) % (limit + 1))
    }

    async fn next_event(&self) -> Result<ServerEvent, TransportError> {
        tokio::time::sleep(self.event_interval).await;
        Ok(ServerEvent {
            event: "posted".to_string(),
            seq: self.events.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }
}

/// Builds one [`SimulatedTransport`] per entity.
#[derive(Debug, Clone)]
pub struct SimulatedTransports {
    settings: SimulatedConfig,
}

impl SimulatedTransports {
    pub fn new(settings: SimulatedConfig) -> Self {
        Self { settings }
    }
}

impl TransportProvider for SimulatedTransports {
    fn connect(
        &self,
        _connection: &ConnectionConfig,
        user: &UserIdentity,
    ) -> Result<Arc<dyn EntityTransport>, TransportError> {
        Ok(Arc::new(SimulatedTransport::new(&self.settings, user)))
    }
}
