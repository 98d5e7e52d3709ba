//! # User Entities
//!
//! An entity is one simulated user acting against the target service. Every entity runs
//! one or more *behavior variants* (posting, reading, listening), each as its own task.
//!
//! ## Structure
//!
//! - [`EntityConfig`] - the immutable bundle of capabilities one entity receives
//! - [`EntityFactory`] - pure constructor from an `EntityConfig` to a [`UserEntity`]
//! - [`UserEntity`] - closed set of variants behind a single [`UserEntity::start`]
//! - [`EntityBehavior`] - the loop every variant implements
//!
//! ## The start contract
//!
//! `start` returns only after the variant's loop observed the stop signal, or after the
//! variant hit an unrecoverable error. Either way:
//!
//! 1. the error (if any) becomes a status report, never a panic or a returned `Err`
//! 2. a final `Stopped` report is sent
//! 3. exactly one completion is acknowledged, by a guard armed before anything else

pub mod listener;
pub mod poster;
pub mod reader;

pub use listener::ListenerEntity;
pub use poster::PosterEntity;
pub use reader::ReaderEntity;

use crate::clients::{EntityTransport, TransportError};
use crate::framework::{CompletionCounter, LoadTestError, StopSignal};
use crate::lifecycle::reporter::StatusSender;
use crate::model::{EntityStatus, LoadTestConfig, ServerState, StatusReport, UserIdentity};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};

// =============================================================================
// 1. VARIANT NAMES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Poster,
    Reader,
    Listener,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Poster, EntityKind::Reader, EntityKind::Listener];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Poster => "poster",
            EntityKind::Reader => "reader",
            EntityKind::Listener => "listener",
        }
    }

    pub fn factory(self) -> EntityFactory {
        match self {
            EntityKind::Poster => poster_factory,
            EntityKind::Reader => reader_factory,
            EntityKind::Listener => listener_factory,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LoadTestError::UnknownEntityKind(s.to_string()))
    }
}

/// Resolves configured kind names to factories, in order.
pub fn factories_for<S: AsRef<str>>(kinds: &[S]) -> Result<Vec<EntityFactory>, LoadTestError> {
    kinds
        .iter()
        .map(|kind| kind.as_ref().parse::<EntityKind>().map(EntityKind::factory))
        .collect()
}

// =============================================================================
// 2. CONFIGURATION BUNDLE
// =============================================================================

/// Everything one entity needs, built once by the orchestrator and shared by all of the
/// entity's variants. Never mutated after construction.
#[derive(Clone)]
pub struct EntityConfig {
    /// Ordinal of the entity, `0..num_client_entities`.
    pub id: usize,
    pub user: UserIdentity,
    pub transport: Arc<dyn EntityTransport>,
    pub load_test: Arc<LoadTestConfig>,
    pub state: Arc<ServerState>,
    pub status: StatusSender,
    pub stop: StopSignal,
    pub completion: CompletionCounter,
}

impl fmt::Debug for EntityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityConfig")
            .field("id", &self.id)
            .field("user", &self.user.username)
            .finish_non_exhaustive()
    }
}

impl EntityConfig {
    pub fn report(&self, kind: EntityKind, status: EntityStatus, details: impl Into<String>) -> StatusReport {
        StatusReport::new(self.id, self.user.username.clone(), Some(kind), status, details)
    }

    /// Best-effort report from inside an execution loop.
    pub async fn emit(&self, kind: EntityKind, status: EntityStatus, details: impl Into<String>) {
        self.status
            .report(self.report(kind, status, details), &self.stop)
            .await;
    }

    pub fn action_interval(&self) -> Duration {
        self.load_test.user_entities.action_interval()
    }

    /// Sleeps for `duration` unless the stop signal closes first.
    ///
    /// Returns `false` when the entity should stop.
    pub async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.stop.closed() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

// =============================================================================
// 3. BEHAVIOR CONTRACT
// =============================================================================

/// The execution loop of one variant.
#[async_trait]
pub trait EntityBehavior: Send {
    const KIND: EntityKind;

    fn config(&self) -> &EntityConfig;

    /// Runs until the stop signal is observed (`Ok`) or an unrecoverable error occurs.
    ///
    /// Recoverable failures are reported and the loop continues. Implementations must
    /// race every await against the stop signal.
    async fn run(&mut self) -> Result<(), TransportError>;
}

/// Pure constructor of one entity variant. Must not perform I/O.
pub type EntityFactory = fn(EntityConfig) -> UserEntity;

pub fn poster_factory(config: EntityConfig) -> UserEntity {
    UserEntity::Poster(PosterEntity::new(config))
}

pub fn reader_factory(config: EntityConfig) -> UserEntity {
    UserEntity::Reader(ReaderEntity::new(config))
}

pub fn listener_factory(config: EntityConfig) -> UserEntity {
    UserEntity::Listener(ListenerEntity::new(config))
}

// =============================================================================
// 4. THE CLOSED VARIANT SET
// =============================================================================

pub enum UserEntity {
    Poster(PosterEntity),
    Reader(ReaderEntity),
    Listener(ListenerEntity),
}

impl UserEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            UserEntity::Poster(_) => PosterEntity::KIND,
            UserEntity::Reader(_) => ReaderEntity::KIND,
            UserEntity::Listener(_) => ListenerEntity::KIND,
        }
    }

    pub fn config(&self) -> &EntityConfig {
        match self {
            UserEntity::Poster(entity) => entity.config(),
            UserEntity::Reader(entity) => entity.config(),
            UserEntity::Listener(entity) => entity.config(),
        }
    }

    /// Runs the entity until it stops, then acknowledges its completion.
    pub async fn start(mut self) {
        let config = self.config().clone();
        // Dropped last: acknowledges only after the loop has exited and the final
        // reports are queued, including when the loop panics.
        let _completion = config.completion.guard();

        let kind = self.kind();
        let span = info_span!("entity", id = config.id, %kind, user = %config.user.username);

        async move {
            info!("Entity started");
            config.emit(kind, EntityStatus::Launching, "").await;

            let result = match &mut self {
                UserEntity::Poster(entity) => entity.run().await,
                UserEntity::Reader(entity) => entity.run().await,
                UserEntity::Listener(entity) => entity.run().await,
            };

            if let Err(e) = result {
                warn!(error = %e, "Entity failed");
                config
                    .status
                    .report_final(config.report(kind, EntityStatus::Error, e.to_string()))
                    .await;
            }
            config
                .status
                .report_final(config.report(kind, EntityStatus::Stopped, ""))
                .await;
            info!("Entity stopped");
        }
        .instrument(span)
        .await
    }
}
