//! # Mock Framework
//!
//! Utilities for testing entities and the orchestrator without a target service.
//!
//! - [`MockTransport`] records posts and replays scripted events
//! - [`MockTransports`] hands out mock transports and remembers who connected
//! - [`MemorySink`] captures console output with the (tokio) time each line was written
//!
//! # Example
//! ```ignore
//! let transports = MockTransports::new().fail_for("bob");
//! let sink = MemorySink::new();
//!
//! let summary = Orchestrator::new(config, state)
//!     .with_transports(Arc::new(transports.clone()))
//!     .with_output(Arc::new(sink.clone()))
//!     .run(&factories, shutdown_rx)
//!     .await?;
//!
//! assert_eq!(transports.connected(), vec!["alice"]);
//! assert!(sink.lines().last().unwrap().contains("DONE!"));
//! ```

use crate::clients::{EntityTransport, ServerEvent, TransportError, TransportProvider};
use crate::lifecycle::output::OutputSink;
use crate::model::{ConnectionConfig, UserIdentity};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

// =============================================================================
// TRANSPORT
// =============================================================================

/// Transport double. Posts succeed (and are recorded) unless failing is switched on;
/// events come only from [`MockTransport::push_event`].
pub struct MockTransport {
    username: String,
    posts: Mutex<Vec<(String, String)>>,
    fail_posts: AtomicBool,
    event_sender: Mutex<Option<mpsc::UnboundedSender<ServerEvent>>>,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerEvent>>,
}

impl MockTransport {
    pub fn new(username: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            username: username.into(),
            posts: Mutex::new(Vec::new()),
            fail_posts: AtomicBool::new(false),
            event_sender: Mutex::new(Some(sender)),
            events: tokio::sync::Mutex::new(receiver),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Every `(channel_id, message)` posted so far.
    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn fail_posts(&self, fail: bool) {
        self.fail_posts.store(fail, Ordering::SeqCst);
    }

    /// Queues an event for `next_event`. Ignored after [`close_events`](Self::close_events).
    pub fn push_event(&self, event: &str, seq: u64) {
        if let Some(sender) = self.event_sender.lock().unwrap().as_ref() {
            let _ = sender.send(ServerEvent {
                event: event.to_string(),
                seq,
            });
        }
    }

    /// Ends the event stream: once queued events are consumed, `next_event` fails with
    /// [`TransportError::StreamClosed`].
    pub fn close_events(&self) {
        self.event_sender.lock().unwrap().take();
    }
}

#[async_trait]
impl EntityTransport for MockTransport {
    async fn create_post(&self, channel_id: &str, message: &str) -> Result<(), TransportError> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(TransportError::Simulated(format!("post by {} rejected", self.username)));
        }
        self.posts
            .lock()
            .unwrap()
            .push((channel_id.to_string(), message.to_string()));
        Ok(())
    }

    async fn recent_posts(&self, channel_id: &str, limit: usize) -> Result<usize, TransportError> {
        let posts = self.posts.lock().unwrap();
        Ok(posts.iter().filter(|(c, _)| c == channel_id).count().min(limit))
    }

    async fn next_event(&self) -> Result<ServerEvent, TransportError> {
        self.events
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::StreamClosed)
    }
}

// =============================================================================
// PROVIDER
// =============================================================================

#[derive(Default)]
struct ProviderState {
    connected: Vec<String>,
    transports: Vec<Arc<MockTransport>>,
}

/// Provider double. Cheap to clone; clones share what they recorded.
#[derive(Clone, Default)]
pub struct MockTransports {
    state: Arc<Mutex<ProviderState>>,
    failing_users: Arc<HashSet<String>>,
    closed_streams: bool,
}

impl MockTransports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `connect` fail for this username.
    pub fn fail_for(mut self, username: &str) -> Self {
        let mut failing = (*self.failing_users).clone();
        failing.insert(username.to_string());
        self.failing_users = Arc::new(failing);
        self
    }

    /// Hands out transports whose event stream is already closed.
    pub fn with_closed_streams(mut self) -> Self {
        self.closed_streams = true;
        self
    }

    /// Usernames of successful connects, in order.
    pub fn connected(&self) -> Vec<String> {
        self.state.lock().unwrap().connected.clone()
    }

    /// Transports handed out, in order.
    pub fn transports(&self) -> Vec<Arc<MockTransport>> {
        self.state.lock().unwrap().transports.clone()
    }
}

impl TransportProvider for MockTransports {
    fn connect(
        &self,
        _connection: &ConnectionConfig,
        user: &UserIdentity,
    ) -> Result<Arc<dyn EntityTransport>, TransportError> {
        if self.failing_users.contains(&user.username) {
            return Err(TransportError::InvalidCredentials(user.username.clone()));
        }
        let transport = Arc::new(MockTransport::new(user.username.clone()));
        if self.closed_streams {
            transport.close_events();
        }

        let mut state = self.state.lock().unwrap();
        state.connected.push(user.username.clone());
        state.transports.push(transport.clone());
        Ok(transport)
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Output sink that keeps every line in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<(Instant, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Lines with the tokio instant they were written at. Under paused time these are
    /// exact.
    pub fn timed_lines(&self) -> Vec<(Instant, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.contains(needle))
            .collect()
    }
}

impl OutputSink for MemorySink {
    fn println(&self, line: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((Instant::now(), line.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserIdentity {
        UserIdentity {
            id: name.into(),
            username: name.into(),
            auth_token: String::new(),
        }
    }

    #[tokio::test]
    async fn test_mock_transport_replays_events_then_closes() {
        let transport = MockTransport::new("alice");
        transport.push_event("posted", 1);
        transport.close_events();
        transport.push_event("ignored", 2);

        assert_eq!(transport.next_event().await.unwrap().seq, 1);
        assert!(matches!(
            transport.next_event().await,
            Err(TransportError::StreamClosed)
        ));
    }

    #[tokio::test]
    async fn test_mock_transport_records_posts() {
        let transport = MockTransport::new("alice");
        transport.create_post("c1", "hello").await.unwrap();
        transport.create_post("c2", "world").await.unwrap();
        transport.fail_posts(true);
        assert!(transport.create_post("c1", "again").await.is_err());

        assert_eq!(transport.posts().len(), 2);
        assert_eq!(transport.recent_posts("c1", 10).await.unwrap(), 1);
    }

    #[test]
    fn test_provider_records_connects() {
        let provider = MockTransports::new().fail_for("bob");
        let connection = ConnectionConfig::default();

        assert!(provider.connect(&connection, &user("alice")).is_ok());
        assert!(provider.connect(&connection, &user("bob")).is_err());
        assert!(provider.clone().connect(&connection, &user("carol")).is_ok());

        assert_eq!(provider.connected(), vec!["alice", "carol"]);
        assert_eq!(provider.transports()[1].username(), "carol");
    }
}
