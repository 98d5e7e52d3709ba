//! Consumes the event stream. A broken stream ends the variant with an error.

use super::{EntityBehavior, EntityConfig, EntityKind};
use crate::clients::TransportError;
use crate::model::EntityStatus;
use async_trait::async_trait;
use tracing::debug;

pub struct ListenerEntity {
    config: EntityConfig,
    received: u64,
}

impl ListenerEntity {
    pub fn new(config: EntityConfig) -> Self {
        Self {
            config,
            received: 0,
        }
    }
}

#[async_trait]
impl EntityBehavior for ListenerEntity {
    const KIND: EntityKind = EntityKind::Listener;

    fn config(&self) -> &EntityConfig {
        &self.config
    }

    async fn run(&mut self) -> Result<(), TransportError> {
        let config = self.config.clone();
        let kind = Self::KIND;

        loop {
            let event = tokio::select! {
                biased;
                _ = config.stop.closed() => return Ok(()),
                event = config.transport.next_event() => event?,
            };

            self.received += 1;
            if self.received == 1 {
                config.emit(kind, EntityStatus::Active, "").await;
            }
            debug!(event = %event.event, seq = event.seq, "Event received");
            config
                .emit(
                    kind,
                    EntityStatus::ActionReceived,
                    format!("{} #{}", event.event, event.seq),
                )
                .await;
        }
    }
}
