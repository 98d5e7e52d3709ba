//! Polls recent posts of one channel per action interval.

use super::{EntityBehavior, EntityConfig, EntityKind};
use crate::clients::TransportError;
use crate::model::EntityStatus;
use async_trait::async_trait;

/// Page size of one poll.
pub const RECENT_POSTS_LIMIT: usize = 30;

pub struct ReaderEntity {
    config: EntityConfig,
    polls: usize,
    succeeded: usize,
}

impl ReaderEntity {
    pub fn new(config: EntityConfig) -> Self {
        Self {
            config,
            polls: 0,
            succeeded: 0,
        }
    }
}

#[async_trait]
impl EntityBehavior for ReaderEntity {
    const KIND: EntityKind = EntityKind::Reader;

    fn config(&self) -> &EntityConfig {
        &self.config
    }

    async fn run(&mut self) -> Result<(), TransportError> {
        let config = self.config.clone();
        let kind = Self::KIND;

        if config.state.channels.is_empty() {
            config.emit(kind, EntityStatus::Active, "no channels to read").await;
            config.stop.closed().await;
            return Ok(());
        }

        loop {
            let channel = match config.state.channel_for(config.id + self.polls) {
                Some(channel) => channel.id.clone(),
                None => return Ok(()),
            };
            self.polls += 1;

            let result = tokio::select! {
                biased;
                _ = config.stop.closed() => return Ok(()),
                result = config.transport.recent_posts(&channel, RECENT_POSTS_LIMIT) => result,
            };

            match result {
                Ok(count) => {
                    self.succeeded += 1;
                    if self.succeeded == 1 {
                        config.emit(kind, EntityStatus::Active, "").await;
                    }
                    config
                        .emit(
                            kind,
                            EntityStatus::ActionReceived,
                            format!("{} posts in {}", count, channel),
                        )
                        .await;
                }
                Err(e) => {
                    config.emit(kind, EntityStatus::FailedActive, e.to_string()).await;
                }
            }

            if !config.pause(config.action_interval()).await {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::reader_factory;
    use super::super::testing::harness;
    use crate::clients::EntityTransport;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_reader_reports_post_counts() {
        let h = harness(1, 100);
        h.transport.create_post("c0", "one").await.unwrap();
        h.transport.create_post("c0", "two").await.unwrap();

        let task = tokio::spawn(reader_factory(h.config.clone()).start());
        tokio::time::sleep(Duration::from_millis(250)).await;
        h.config.stop.close();
        task.await.unwrap();

        let sink = h.sink.clone();
        let totals = h.finish().await;
        assert_eq!(totals.actions_received, 3);
        assert_eq!(totals.active, 1);
        assert_eq!(sink.lines_containing("2 posts in c0").len(), 3);
        assert!(sink.lines_containing("reader alice [STOPPED]").len() == 1);
    }
}
