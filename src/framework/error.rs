//! # Load Test Errors
//!
//! Errors that stop a load test from starting or from shutting down cleanly.
//!
//! Per-entity runtime failures are deliberately absent here: an entity converts its
//! own failures into status reports and never hands them to the orchestrator.

use thiserror::Error;

/// Fatal errors raised by the orchestrator and the binary's setup code.
#[derive(Debug, Error)]
pub enum LoadTestError {
    /// The server state has no simulated-user identities to hand out.
    #[error("server state contains no users")]
    NoUsers,

    /// `run` was called without any entity factory.
    #[error("no entity factories registered")]
    NoEntityFactories,

    /// A configured entity kind does not name a known behavior.
    #[error("unknown entity kind: {0}")]
    UnknownEntityKind(String),

    /// Loading or deserializing the layered configuration failed.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The server state file could not be parsed.
    #[error("server state error: {0}")]
    State(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The OS interrupt handler could not be installed.
    #[error("failed to register interrupt handler: {0}")]
    SignalHandler(std::io::Error),

    /// The status reporter task panicked or was cancelled.
    #[error("status reporter failed: {0}")]
    ReporterFailed(String),
}
