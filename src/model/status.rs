use crate::entities::EntityKind;
use std::fmt;

/// Lifecycle and activity states an entity reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityStatus {
    /// Released from the barrier and stagger delay, about to run.
    Launching,
    /// First successful contact with the target service.
    Active,
    /// Left its execution loop.
    Stopped,
    /// Unrecoverable internal error, the entity is exiting.
    Error,
    /// Could not be set up at all (e.g. transport construction failed).
    FailedLaunch,
    /// One action failed, the entity keeps running.
    FailedActive,
    /// Sent a request to the target service.
    ActionSent,
    /// Received data from the target service.
    ActionReceived,
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityStatus::Launching => "LAUNCHING",
            EntityStatus::Active => "ACTIVE",
            EntityStatus::Stopped => "STOPPED",
            EntityStatus::Error => "ERROR",
            EntityStatus::FailedLaunch => "FAILED_LAUNCH",
            EntityStatus::FailedActive => "FAILED_ACTIVE",
            EntityStatus::ActionSent => "ACTION_SENT",
            EntityStatus::ActionReceived => "ACTION_RECEIVED",
        };
        f.write_str(label)
    }
}

/// One observable event from one entity.
///
/// Delivery order is the only timestamp: reports from a single entity arrive in the
/// order they were sent, reports from different entities interleave arbitrarily.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub entity_id: usize,
    pub username: String,
    /// `None` when the report concerns the entity as a whole rather than one variant.
    pub kind: Option<EntityKind>,
    pub status: EntityStatus,
    pub details: String,
}

impl StatusReport {
    pub fn new(
        entity_id: usize,
        username: impl Into<String>,
        kind: Option<EntityKind>,
        status: EntityStatus,
        details: impl Into<String>,
    ) -> Self {
        Self {
            entity_id,
            username: username.into(),
            kind,
            status,
            details: details.into(),
        }
    }
}
