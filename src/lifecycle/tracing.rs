//! # Observability & Tracing
//!
//! [`setup_tracing`] initializes structured logging with the `tracing` crate.
//!
//! Tracing is diagnostics only. The operator-facing lines (phase transitions, rendered
//! status reports) go through [`OutputSink`](super::output::OutputSink) and appear
//! whatever the log level; every phase line is also emitted as an `info` event with a
//! `phase` field.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Phases, entity start/stop, shutdown (default)
//! RUST_LOG=info cargo run
//!
//! # Per-report and per-action events, stagger of every scheduled entity
//! RUST_LOG=debug cargo run
//!
//! # Only the orchestrator
//! RUST_LOG=entity_swarm::lifecycle=debug cargo run
//! ```
//!
//! ## Spans
//!
//! Every entity variant runs inside an `entity` span carrying its id, kind and user, so
//! interleaved logs from hundreds of entities stay attributable:
//!
//! ```text
//! INFO entity{id=3 kind=poster user=user3}: Entity started
//! WARN entity{id=3 kind=listener user=user3}: Entity failed error=event stream closed
//! ```

/// Installs the global subscriber. Filter comes from `RUST_LOG`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // Spans already say which entity a line belongs to
        .compact()
        .init();
}
