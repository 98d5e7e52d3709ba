//! Posts a message at every action interval, cycling through the known channels.

use super::{EntityBehavior, EntityConfig, EntityKind};
use crate::clients::TransportError;
use crate::model::EntityStatus;
use async_trait::async_trait;
use tracing::debug;

pub struct PosterEntity {
    config: EntityConfig,
    attempts: usize,
    sent: usize,
}

impl PosterEntity {
    pub fn new(config: EntityConfig) -> Self {
        Self {
            config,
            attempts: 0,
            sent: 0,
        }
    }
}

#[async_trait]
impl EntityBehavior for PosterEntity {
    const KIND: EntityKind = EntityKind::Poster;

    fn config(&self) -> &EntityConfig {
        &self.config
    }

    async fn run(&mut self) -> Result<(), TransportError> {
        let config = self.config.clone();
        let kind = Self::KIND;

        if config.state.channels.is_empty() {
            config.emit(kind, EntityStatus::Active, "no channels to post to").await;
            config.stop.closed().await;
            return Ok(());
        }

        loop {
            // Offset by entity id so entities spread over channels from the first post.
            let channel = match config.state.channel_for(config.id + self.attempts) {
                Some(channel) => channel.id.clone(),
                None => return Ok(()),
            };
            let message = format!("message {} from {}", self.attempts, config.user.username);
            self.attempts += 1;

            let result = tokio::select! {
                biased;
                _ = config.stop.closed() => return Ok(()),
                result = config.transport.create_post(&channel, &message) => result,
            };

            match result {
                Ok(()) => {
                    self.sent += 1;
                    if self.sent == 1 {
                        config.emit(kind, EntityStatus::Active, "").await;
                    }
                    debug!(%channel, "Posted");
                    config
                        .emit(kind, EntityStatus::ActionSent, format!("posted to {}", channel))
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
    use super::super::poster_factory;
    use super::super::testing::harness;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_poster_cycles_channels_until_stopped() {
        let h = harness(2, 100);
        let entity = poster_factory(h.config.clone());
        let task = tokio::spawn(entity.start());

        tokio::time::sleep(Duration::from_millis(350)).await;
        h.config.stop.close();
        task.await.unwrap();

        let channels: Vec<String> = h.transport.posts().into_iter().map(|(c, _)| c).collect();
        assert_eq!(channels, vec!["c0", "c1", "c0", "c1"]);
        assert_eq!(h.config.completion.pending(), 0);

        let sink = h.sink.clone();
        let totals = h.finish().await;
        assert_eq!(totals.actions_sent, 4);
        assert_eq!(totals.active, 1);
        assert_eq!(totals.launched, 1);
        assert_eq!(totals.stopped, 1);
        assert_eq!(sink.lines_containing("[LAUNCHING]").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_posts_are_reported_and_retried() {
        let h = harness(1, 100);
        h.transport.fail_posts(true);
        let task = tokio::spawn(poster_factory(h.config.clone()).start());

        tokio::time::sleep(Duration::from_millis(150)).await;
        h.config.stop.close();
        task.await.unwrap();

        let totals = h.finish().await;
        assert_eq!(totals.failed_actions, 2);
        assert_eq!(totals.actions_sent, 0);
        assert_eq!(totals.active, 0);
        assert_eq!(totals.errors, 0);
        assert_eq!(totals.stopped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poster_without_channels_idles_until_stopped() {
        let h = harness(0, 100);
        let task = tokio::spawn(poster_factory(h.config.clone()).start());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!task.is_finished());
        h.config.stop.close();
        task.await.unwrap();

        assert!(h.transport.posts().is_empty());
        assert_eq!(h.config.completion.pending(), 0);
    }
}
