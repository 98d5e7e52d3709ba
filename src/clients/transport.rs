//! # Entity Transport
//!
//! The capability an entity uses to reach the target service: a request/response client
//! plus an event stream, bound to one simulated user.
//!
//! The orchestrator never looks inside a transport. It asks a [`TransportProvider`] for
//! one transport per entity, before any entity variant is constructed, and hands the
//! same `Arc` to every variant of that entity.

use crate::model::{ConnectionConfig, UserIdentity};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a transport. Entities turn these into status reports.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status code.
    #[error("unexpected status: {0}")]
    Status(u16),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The event stream ended.
    #[error("event stream closed")]
    StreamClosed,

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The session token cannot be used as a credential.
    #[error("invalid credentials for {0}")]
    InvalidCredentials(String),

    /// Failure injected by the simulated or mock transport.
    #[error("simulated failure: {0}")]
    Simulated(String),
}

/// One event pushed by the target service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerEvent {
    pub event: String,
    #[serde(default)]
    pub seq: u64,
}

/// Request/response plus streaming access to the target service for one user.
///
/// Methods take `&self`: one transport is shared by every variant of an entity.
#[async_trait]
pub trait EntityTransport: Send + Sync {
    /// Publishes `message` to a channel.
    async fn create_post(&self, channel_id: &str, message: &str) -> Result<(), TransportError>;

    /// Fetches up to `limit` recent posts of a channel, returning how many came back.
    async fn recent_posts(&self, channel_id: &str, limit: usize) -> Result<usize, TransportError>;

    /// Waits for the next pushed event, connecting the stream first if needed.
    async fn next_event(&self) -> Result<ServerEvent, TransportError>;
}

/// Builds the transport for one entity.
///
/// Construction must not block or perform network I/O: connections are opened lazily
/// by the transport itself once the entity runs.
pub trait TransportProvider: Send + Sync {
    fn connect(
        &self,
        connection: &ConnectionConfig,
        user: &UserIdentity,
    ) -> Result<Arc<dyn EntityTransport>, TransportError>;
}
