//! # Entity Swarm
//!
//! > **A concurrent load-generation orchestrator.**
//!
//! Spawns many independent simulated users ("entities") against a target service,
//! staggers their startup to avoid a thundering herd, collects their status reports
//! through a single reporter, and shuts everything down on an operator interrupt without
//! losing an entity or a report.
//!
//! ## 🏗️ Architecture
//!
//! ### 1. Coordination Primitives ([`framework`])
//! The only shared mutable state of a run.
//! - [`StopSignal`](framework::StopSignal): broadcast-once, idempotent cancellation.
//! - [`ReleaseBarrier`](framework::ReleaseBarrier): holds entity tasks until all are scheduled.
//! - [`CompletionCounter`](framework::CompletionCounter): countdown latch; entities
//!   acknowledge through a drop guard, so exactly once on every exit path.
//!
//! ### 2. The Data ([`model`])
//! Configuration, the server state (users and channels) and status reports. Read-only
//! once loaded.
//!
//! ### 3. The Transports ([`clients`])
//! How an entity reaches the target service: HTTP plus websocket, or an in-process
//! simulation. Entities only see the [`EntityTransport`](clients::EntityTransport) trait.
//!
//! ### 4. The Entities ([`entities`])
//! A closed set of behavior variants (poster, reader, listener) behind one `start()`.
//!
//! ### 5. The Lifecycle ([`lifecycle`])
//! The [`Orchestrator`](lifecycle::Orchestrator), the status reporter, signal handling
//! and output.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # 20 simulated entities, 250 ms apart, stop with Ctrl-C
//! RUST_LOG=info cargo run -- --state serverstate.json --entities 20 --rampup-ms 250
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod clients;
pub mod entities;
pub mod framework;
pub mod lifecycle;
pub mod model;
