//! # Entity Swarm
//!
//! Command-line entry point: loads configuration and server state, then runs the load
//! test until SIGINT/SIGTERM.
//!
//! Configuration precedence, lowest first: built-in defaults, `<config-dir>/default.toml`,
//! `<config-dir>/$LOADTEST_ENV`, `LOADTEST_*` environment variables, command-line flags.

use clap::Parser;
use entity_swarm::entities::factories_for;
use entity_swarm::framework::LoadTestError;
use entity_swarm::lifecycle::{setup_tracing, InterruptListener, Orchestrator};
use entity_swarm::model::{LoadTestConfig, ServerState, TransportKind};
use std::path::PathBuf;
use tracing::{info, Instrument};

#[derive(Debug, Parser)]
#[command(name = "entity-swarm", about = "Concurrent load generator", version)]
struct Cli {
    /// Directory holding default.toml and per-environment overrides.
    #[arg(long, env = "LOADTEST_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Server state JSON (users and channels).
    #[arg(long, default_value = "serverstate.json")]
    state: PathBuf,

    /// Overrides user_entities.num_client_entities.
    #[arg(long)]
    entities: Option<usize>,

    /// Overrides user_entities.entity_rampup_distance_milliseconds.
    #[arg(long)]
    rampup_ms: Option<u64>,

    /// Overrides transport.
    #[arg(long, value_enum)]
    transport: Option<TransportKind>,
}

#[tokio::main]
async fn main() -> Result<(), LoadTestError> {
    let cli = Cli::parse();
    setup_tracing();

    let mut config = LoadTestConfig::load_from(&cli.config_dir)?;
    if let Some(entities) = cli.entities {
        config.user_entities.num_client_entities = entities;
    }
    if let Some(rampup_ms) = cli.rampup_ms {
        config.user_entities.entity_rampup_distance_milliseconds = rampup_ms;
    }
    if let Some(transport) = cli.transport {
        config.transport = transport;
    }

    let state = ServerState::load(&cli.state)?;
    let factories = factories_for(&config.user_entities.entity_kinds)?;
    // Registered before anything runs; failing here aborts startup.
    let listener = InterruptListener::install()?;

    info!(
        entities = config.user_entities.num_client_entities,
        users = state.users.len(),
        kinds = ?config.user_entities.entity_kinds,
        transport = ?config.transport,
        "Starting load test"
    );

    let span = tracing::info_span!("load_test");
    let summary = Orchestrator::new(config, state)
        .run(&factories, listener)
        .instrument(span)
        .await?;

    info!(
        entities = summary.entities,
        tasks = summary.launched_tasks,
        failed_launches = summary.failed_launches,
        reports_dropped = summary.reports_dropped,
        status = %summary.status.summary(),
        "Load test completed"
    );
    Ok(())
}
