//! End-to-end runs of the orchestrator against mock transports, in paused time.

use entity_swarm::entities::{listener_factory, poster_factory, EntityFactory};
use entity_swarm::framework::mock::{MemorySink, MockTransports};
use entity_swarm::framework::LoadTestError;
use entity_swarm::lifecycle::{Orchestrator, RunSummary};
use entity_swarm::model::{ChannelRef, LoadTestConfig, ServerState, UserIdentity};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn server_state(users: usize, channels: usize) -> ServerState {
    ServerState {
        users: (0..users)
            .map(|i| UserIdentity {
                id: format!("u{}", i),
                username: format!("user{}", i),
                auth_token: format!("token{}", i),
            })
            .collect(),
        channels: (0..channels)
            .map(|i| ChannelRef {
                id: format!("c{}", i),
                name: format!("channel-{}", i),
            })
            .collect(),
    }
}

fn config(entities: usize, rampup_ms: u64) -> LoadTestConfig {
    let mut config = LoadTestConfig::default();
    config.user_entities.num_client_entities = entities;
    config.user_entities.entity_rampup_distance_milliseconds = rampup_ms;
    config.user_entities.entity_action_rate_milliseconds = 1000;
    config
}

struct Run {
    sink: MemorySink,
    transports: MockTransports,
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<Result<RunSummary, LoadTestError>>,
}

fn start(
    config: LoadTestConfig,
    state: ServerState,
    transports: MockTransports,
    factories: &'static [EntityFactory],
) -> Run {
    let sink = MemorySink::new();
    let (shutdown, rx) = mpsc::channel(8);
    let orchestrator = Orchestrator::new(config, state)
        .with_output(Arc::new(sink.clone()))
        .with_transports(Arc::new(transports.clone()));
    let handle = tokio::spawn(orchestrator.run(factories, rx));
    Run {
        sink,
        transports,
        shutdown,
        handle,
    }
}

const PHASES: [&str; 6] = [
    "Done starting entities",
    "Shutdown signal received.",
    "Waiting for user entities",
    "Flushing status reporting channel",
    "Status reporter stopped",
    "DONE!",
];

fn assert_phases_in_order(lines: &[String]) {
    let mut last = 0;
    for phase in PHASES {
        let found = lines
            .iter()
            .enumerate()
            .skip(last)
            .find(|(_, line)| line.contains(phase))
            .map(|(i, _)| i)
            .unwrap_or_else(|| panic!("missing or out of order: {}", phase));
        last = found;
    }
    assert_eq!(lines.last().unwrap(), "DONE!");
    assert_eq!(lines.iter().filter(|l| l.as_str() == "DONE!").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_three_entities_two_users_staggered() {
    let run = start(
        config(3, 100),
        server_state(2, 0),
        MockTransports::new(),
        &[listener_factory],
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    run.shutdown.send(()).await.unwrap();
    let summary = run.handle.await.unwrap().unwrap();

    // Identities wrap around: entity i acts as user i mod 2.
    assert_eq!(run.transports.connected(), vec!["user0", "user1", "user0"]);

    let timed = run.sink.timed_lines();
    let released = timed
        .iter()
        .find(|(_, line)| line.ends_with("Done starting entities"))
        .map(|(at, _)| *at)
        .unwrap();
    for entity in 0..3u64 {
        let prefix = format!("#{} listener", entity);
        let launched = timed
            .iter()
            .find(|(_, line)| line.starts_with(&prefix) && line.contains("[LAUNCHING]"))
            .map(|(at, _)| *at)
            .unwrap();
        assert_eq!(launched - released, Duration::from_millis(100 * entity));
    }

    let lines = run.sink.lines();
    assert_phases_in_order(&lines);
    assert_eq!(
        &lines[..4],
        &[
            "------------------------- Starting 3 entities",
            "Starting Entity: 0",
            "Starting Entity: 1",
            "Starting Entity: 2",
        ]
    );

    // Every accepted report rendered exactly once.
    let rendered = lines.iter().filter(|l| l.starts_with('#')).count();
    assert_eq!(summary.reports_accepted, rendered);
    assert_eq!(summary.reports_dropped, 0);
    assert_eq!(summary.status.reports, rendered);
    assert_eq!(summary.status.launched, 3);
    assert_eq!(summary.status.stopped, 3);
    assert_eq!(summary.launched_tasks, 3);
    assert_eq!(summary.entities, 3);
}

#[tokio::test(start_paused = true)]
async fn test_zero_entities_still_shuts_down_cleanly() {
    let run = start(
        config(0, 100),
        server_state(1, 0),
        MockTransports::new(),
        &[poster_factory],
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!run.handle.is_finished(), "must wait for the interrupt");
    run.shutdown.send(()).await.unwrap();
    let summary = run.handle.await.unwrap().unwrap();

    let lines = run.sink.lines();
    assert_eq!(lines[0], "------------------------- Starting 0 entities");
    assert_phases_in_order(&lines);
    assert_eq!(lines.len(), 7);
    assert_eq!(summary.launched_tasks, 0);
    assert_eq!(summary.reports_accepted, 0);
    assert_eq!(summary.status.reports, 0);
    assert!(run.transports.connected().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_before_scheduling_finishes() {
    let run = start(
        config(10, 10_000),
        server_state(3, 1),
        MockTransports::new(),
        &[poster_factory, listener_factory],
    );
    // Queued before the orchestrator task has even been polled.
    run.shutdown.send(()).await.unwrap();

    let started = tokio::time::Instant::now();
    let summary = run.handle.await.unwrap().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(summary.launched_tasks, 20);
    assert_eq!(summary.status.launched, 20);
    assert_eq!(summary.status.stopped, 20);
    assert_phases_in_order(&run.sink.lines());
}

#[tokio::test(start_paused = true)]
async fn test_failing_listeners_still_complete() {
    let run = start(
        config(4, 50),
        server_state(2, 0),
        MockTransports::new().with_closed_streams(),
        &[listener_factory],
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    // Every listener already gave up; the run still waits for the interrupt.
    assert!(!run.handle.is_finished());
    run.shutdown.send(()).await.unwrap();
    let summary = run.handle.await.unwrap().unwrap();

    assert_eq!(summary.status.errors, 4);
    assert_eq!(summary.status.stopped, 4);
    assert_eq!(run.sink.lines_containing("[ERROR]: event stream closed").len(), 4);
    assert_phases_in_order(&run.sink.lines());
}

#[tokio::test(start_paused = true)]
async fn test_failed_transport_skips_entity() {
    let run = start(
        config(3, 100),
        server_state(2, 1),
        MockTransports::new().fail_for("user1"),
        &[poster_factory],
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    run.shutdown.send(()).await.unwrap();
    let summary = run.handle.await.unwrap().unwrap();

    assert_eq!(run.transports.connected(), vec!["user0", "user0"]);
    assert_eq!(summary.failed_launches, 1);
    assert_eq!(summary.launched_tasks, 2);
    assert_eq!(summary.status.failed_launches, 1);
    assert_eq!(summary.status.launched, 2);
    assert_eq!(summary.status.stopped, 2);

    assert_eq!(summary.reports_accepted, summary.status.reports);

    let failed = run.sink.lines_containing("[FAILED_LAUNCH]");
    assert_eq!(failed.len(), 1);
    assert!(failed[0].starts_with("#1 entity user1"));
}

#[tokio::test(start_paused = true)]
async fn test_posters_post_until_stopped() {
    let run = start(
        config(2, 0),
        server_state(2, 2),
        MockTransports::new(),
        &[poster_factory],
    );

    tokio::time::sleep(Duration::from_millis(2500)).await;
    run.shutdown.send(()).await.unwrap();
    let summary = run.handle.await.unwrap().unwrap();

    // Posts at 0, 1000 and 2000 ms for each entity.
    for transport in run.transports.transports() {
        assert_eq!(transport.posts().len(), 3);
    }
    assert_eq!(summary.status.actions_sent, 6);
    assert_eq!(summary.status.active, 2);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_interrupts_are_harmless() {
    let run = start(
        config(2, 10),
        server_state(1, 0),
        MockTransports::new(),
        &[listener_factory],
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    for _ in 0..3 {
        run.shutdown.send(()).await.unwrap();
    }
    let summary = run.handle.await.unwrap().unwrap();

    let lines = run.sink.lines();
    assert_eq!(lines_equal(&lines, "Shutdown signal received."), 1);
    assert_phases_in_order(&lines);
    assert_eq!(summary.status.stopped, 2);
}

fn lines_equal(lines: &[String], expected: &str) -> usize {
    lines.iter().filter(|l| l.as_str() == expected).count()
}

#[tokio::test]
async fn test_configuration_errors_fail_fast() {
    let (_tx, rx) = mpsc::channel::<()>(1);
    let sink = MemorySink::new();
    let result = Orchestrator::new(config(3, 100), ServerState::default())
        .with_output(Arc::new(sink.clone()))
        .with_transports(Arc::new(MockTransports::new()))
        .run(&[poster_factory], rx)
        .await;
    assert!(matches!(result, Err(LoadTestError::NoUsers)));

    let (_tx, rx) = mpsc::channel::<()>(1);
    let result = Orchestrator::new(config(3, 100), server_state(1, 0))
        .with_output(Arc::new(sink.clone()))
        .with_transports(Arc::new(MockTransports::new()))
        .run(&[], rx)
        .await;
    assert!(matches!(result, Err(LoadTestError::NoEntityFactories)));
    assert!(sink.lines().is_empty());
}
