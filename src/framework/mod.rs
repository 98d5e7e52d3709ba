//! Coordination primitives for entity lifecycles.
//!
//! These are the only shared, mutable pieces of a load test. Everything else is either
//! immutable configuration or owned by a single task.
//!
//! # Main Components
//!
//! - [`StopSignal`] - broadcast-once cancellation
//! - [`ReleaseBarrier`] - one-shot start gate
//! - [`CompletionCounter`] / [`CompletionGuard`] - countdown latch with exactly-once acknowledgement
//! - [`LoadTestError`] - fatal setup and shutdown errors
//!
//! # Testing
//!
//! See [`mock`] for a scriptable transport and an in-memory output sink.

pub mod counter;
pub mod error;
pub mod gate;
pub mod mock;

pub use counter::{CompletionCounter, CompletionGuard, CounterError};
pub use error::LoadTestError;
pub use gate::{ReleaseBarrier, StopSignal};
