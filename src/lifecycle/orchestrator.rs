use crate::clients::{provider_for, TransportProvider};
use crate::entities::{EntityConfig, EntityFactory, UserEntity};
use crate::framework::{CompletionCounter, LoadTestError, ReleaseBarrier, StopSignal};
use crate::lifecycle::output::{OutputSink, StdoutSink};
use crate::lifecycle::reporter::{StatusReporter, StatusTotals};
use crate::lifecycle::signal::ShutdownSource;
use crate::model::{EntityStatus, LoadTestConfig, ServerState, StatusReport, UserIdentity};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of a completed load test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Entities configured.
    pub entities: usize,
    /// Entity variant tasks spawned (entities with a transport × factories).
    pub launched_tasks: usize,
    /// Entities skipped because their transport could not be built.
    pub failed_launches: usize,
    /// Reports the status queue accepted.
    pub reports_accepted: usize,
    /// Reports dropped because the stop signal beat a full queue.
    pub reports_dropped: usize,
    /// Totals of every status report rendered.
    pub status: StatusTotals,
}

/// The entity lifecycle orchestrator.
///
/// `Orchestrator` is responsible for:
/// - **Fan-out**: one task per entity × factory, each bound to a user identity
/// - **Rampup**: entity `n` starts `n` rampup distances after a common release instant
/// - **Shutdown**: stop broadcast, completion wait, then status drain
///
/// # Example
///
/// ```ignore
/// let listener = InterruptListener::install()?;
/// let summary = Orchestrator::new(config, state)
///     .run(&[poster_factory, listener_factory], listener)
///     .await?;
/// ```
pub struct Orchestrator {
    config: Arc<LoadTestConfig>,
    state: Arc<ServerState>,
    output: Arc<dyn OutputSink>,
    transports: Arc<dyn TransportProvider>,
}

impl Orchestrator {
    /// Writes to stdout and connects with the transport named in `config`.
    pub fn new(config: LoadTestConfig, state: ServerState) -> Self {
        let transports = provider_for(&config);
        Self {
            config: Arc::new(config),
            state: Arc::new(state),
            output: Arc::new(StdoutSink),
            transports,
        }
    }

    pub fn with_output(mut self, output: Arc<dyn OutputSink>) -> Self {
        self.output = output;
        self
    }

    pub fn with_transports(mut self, transports: Arc<dyn TransportProvider>) -> Self {
        self.transports = transports;
        self
    }

    fn say(&self, line: &str) {
        info!(phase = line, "Load test phase");
        self.output.println(line);
    }

    /// Runs the load test until `shutdown` asks to stop and everything has drained.
    ///
    /// Every entity is started with every factory in `factories`. Configuration errors
    /// are returned before anything is scheduled; entity failures never are.
    pub async fn run<S: ShutdownSource>(
        self,
        factories: &[EntityFactory],
        shutdown: S,
    ) -> Result<RunSummary, LoadTestError> {
        self.state.validate()?;
        if factories.is_empty() {
            return Err(LoadTestError::NoEntityFactories);
        }

        let settings = &self.config.user_entities;
        let num_entities = settings.num_client_entities;
        let num_users = self.state.users.len();
        if num_entities > num_users {
            warn!(
                entities = num_entities,
                users = num_users,
                "More entities than users: identities and their session tokens will be shared"
            );
        }
        // With fewer users than entities, several entities act as the same user.
        let assignments = (0..num_entities)
            .map(|n| self.state.user_for(n).cloned().ok_or(LoadTestError::NoUsers))
            .collect::<Result<Vec<UserIdentity>, _>>()?;

        // Started before any entity exists so no report can be lost.
        let (reporter, status) =
            StatusReporter::new(settings.status_channel_capacity, self.output.clone());
        let reporter = reporter.spawn();

        // Latches requests that arrive while entities are still being scheduled.
        let interrupt = StopSignal::new();
        let watcher = tokio::spawn(watch_shutdown(shutdown, interrupt.clone()));

        let stop = StopSignal::new();
        let barrier = ReleaseBarrier::new();
        let completion = CompletionCounter::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(num_entities * factories.len());
        let mut failed_launches = 0;

        self.say(&format!(
            "------------------------- Starting {} entities",
            num_entities
        ));

        for (entity_num, user) in assignments.into_iter().enumerate() {
            self.say(&format!("Starting Entity: {}", entity_num));

            let transport = match self.transports.connect(&self.config.connection, &user) {
                Ok(transport) => transport,
                Err(e) => {
                    warn!(entity_id = entity_num, username = %user.username, error = %e, "Transport construction failed");
                    failed_launches += 1;
                    status
                        .report_final(StatusReport::new(
                            entity_num,
                            user.username.clone(),
                            None,
                            EntityStatus::FailedLaunch,
                            e.to_string(),
                        ))
                        .await;
                    continue;
                }
            };

            let entity_config = EntityConfig {
                id: entity_num,
                user,
                transport,
                load_test: self.config.clone(),
                state: self.state.clone(),
                status: status.clone(),
                stop: stop.clone(),
                completion: completion.clone(),
            };

            completion.add(factories.len());
            let stagger = settings.stagger_for(entity_num);
            for factory in factories {
                let entity = factory(entity_config.clone());
                debug!(entity_id = entity_num, kind = %entity.kind(), ?stagger, "Entity scheduled");
                tasks.push(tokio::spawn(launch(
                    entity,
                    barrier.clone(),
                    stop.clone(),
                    stagger,
                )));
            }
        }

        barrier.open();
        self.say("------------------------- Done starting entities");

        interrupt.closed().await;
        self.say("Shutdown signal received.");
        stop.close();

        self.say("Waiting for user entities");
        completion.wait().await;
        for task in tasks.iter_mut() {
            if let Err(e) = task.await {
                error!(error = %e, "Entity task failed");
            }
        }

        self.say("Flushing status reporting channel");
        let reports_accepted = status.accepted();
        let reports_dropped = status.dropped();
        drop(status);
        let totals = reporter.finish().await?;
        watcher.abort();
        if let Some(closed_at) = stop.closed_at() {
            info!(drain = ?closed_at.elapsed(), reports_dropped, "Load test drained");
        }

        self.say("DONE!");
        Ok(RunSummary {
            entities: num_entities,
            launched_tasks: tasks.len(),
            failed_launches,
            reports_accepted,
            reports_dropped,
            status: totals,
        })
    }
}

/// Holds an entity until release, staggers it, then runs it to completion.
///
/// `start` runs even when the stop signal cuts the stagger short: the entity still
/// reports its launch and acknowledges its registered completion.
async fn launch(entity: UserEntity, barrier: ReleaseBarrier, stop: StopSignal, stagger: Duration) {
    barrier.wait().await;
    let release = barrier
        .opened_at()
        .unwrap_or_else(tokio::time::Instant::now);

    tokio::select! {
        biased;
        _ = stop.closed() => {}
        _ = tokio::time::sleep_until(release + stagger) => {}
    }
    if stop.is_closed() && tokio::time::Instant::now() < release + stagger {
        debug!(entity_id = entity.config().id, "Stagger cut short by stop");
    }
    entity.start().await;
}

/// Turns shutdown requests into a single close of `interrupt`.
///
/// A source that can no longer deliver requests counts as one: nothing else could
/// ever end the run.
async fn watch_shutdown<S: ShutdownSource>(mut source: S, interrupt: StopSignal) {
    loop {
        let requested = source.requested().await;
        if !requested {
            warn!("Shutdown source closed");
        }
        if interrupt.close() {
            info!("Shutdown requested");
        } else {
            warn!("Shutdown requested again: already shutting down");
        }
        if !requested {
            return;
        }
    }
}
