//! Load test lifecycle: orchestration, status reporting, shutdown and output.
//!
//! # Main Components
//!
//! - [`Orchestrator`] - fans entities out, staggers them, owns the stop/drain protocol
//! - [`StatusReporter`] - the single consumer of status reports
//! - [`InterruptListener`] / [`ShutdownSource`] - what ends a run
//! - [`OutputSink`] - operator-facing console lines
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure
//!
//! # Shutdown Order
//!
//! ```text
//! interrupt ──► StopSignal closed ──► every CompletionGuard dropped
//!           ──► reporter stop gate closed ──► queue drained ──► DONE!
//! ```

pub mod orchestrator;
pub mod output;
pub mod reporter;
pub mod signal;
pub mod tracing;

pub use orchestrator::*;
pub use output::*;
pub use reporter::*;
pub use signal::*;
pub use self::tracing::setup_tracing;
