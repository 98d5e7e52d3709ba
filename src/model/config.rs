//! Load test configuration.
//!
//! Loaded in layers with the `config` crate, later sources overriding earlier ones:
//!
//! 1. Built-in defaults (`Default` impls below)
//! 2. `<config_dir>/default.toml` (optional)
//! 3. `<config_dir>/$LOADTEST_ENV.<ext>` (optional, `development` when unset; any format
//!    `config` understands)
//! 4. Environment variables, e.g. `LOADTEST_USER_ENTITIES__NUM_CLIENT_ENTITIES=50`: a
//!    single `_` after the prefix, `__` between nested keys

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Everything the orchestrator and the transports read. Read-only once loaded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadTestConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub user_entities: UserEntitiesConfig,
    /// Which [`EntityTransport`](crate::clients::EntityTransport) implementation to build.
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub simulated: SimulatedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the target service's REST API.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Base URL of the target service's event socket.
    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_milliseconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserEntitiesConfig {
    /// How many entities to launch. Each one runs every configured entity kind.
    #[serde(default)]
    pub num_client_entities: usize,
    /// Stagger between consecutive entity starts.
    #[serde(default = "default_rampup_distance")]
    pub entity_rampup_distance_milliseconds: u64,
    /// Pause between two actions of one entity.
    #[serde(default = "default_action_rate")]
    pub entity_action_rate_milliseconds: u64,
    /// Behavior variants started for every entity, e.g. `["poster", "listener"]`.
    #[serde(default = "default_entity_kinds")]
    pub entity_kinds: Vec<String>,
    /// Bound of the status report queue.
    #[serde(default = "default_status_capacity")]
    pub status_channel_capacity: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    #[default]
    Simulated,
}

/// Knobs for the in-process [`SimulatedTransport`](crate::clients::SimulatedTransport).
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatedConfig {
    #[serde(default = "default_simulated_latency")]
    pub latency_milliseconds: u64,
    /// Every n-th REST call fails. `0` disables failures.
    #[serde(default)]
    pub fail_every: u64,
    #[serde(default = "default_event_interval")]
    pub event_interval_milliseconds: u64,
}

fn default_server_url() -> String {
    "http://localhost:8065".to_string()
}

fn default_websocket_url() -> String {
    "ws://localhost:8065".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_rampup_distance() -> u64 {
    100
}

fn default_action_rate() -> u64 {
    2_000
}

fn default_entity_kinds() -> Vec<String> {
    vec!["poster".to_string(), "listener".to_string()]
}

fn default_status_capacity() -> usize {
    1000
}

fn default_simulated_latency() -> u64 {
    20
}

fn default_event_interval() -> u64 {
    500
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            websocket_url: default_websocket_url(),
            request_timeout_milliseconds: default_request_timeout(),
        }
    }
}

impl Default for UserEntitiesConfig {
    fn default() -> Self {
        Self {
            num_client_entities: 0,
            entity_rampup_distance_milliseconds: default_rampup_distance(),
            entity_action_rate_milliseconds: default_action_rate(),
            entity_kinds: default_entity_kinds(),
            status_channel_capacity: default_status_capacity(),
        }
    }
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            latency_milliseconds: default_simulated_latency(),
            fail_every: 0,
            event_interval_milliseconds: default_event_interval(),
        }
    }
}

impl LoadTestConfig {
    /// Load configuration from a specific directory and the environment.
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(
                    std::env::var("LOADTEST_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            .add_source(
                Environment::with_prefix("LOADTEST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl UserEntitiesConfig {
    pub fn action_interval(&self) -> Duration {
        Duration::from_millis(self.entity_action_rate_milliseconds)
    }

    /// Delay between barrier release and the start of entity `entity_num`.
    ///
    /// Linear and deterministic: entity 0 starts at once, entity `n` waits `n` rampup
    /// distances.
    pub fn stagger_for(&self, entity_num: usize) -> Duration {
        Duration::from_millis(
            self.entity_rampup_distance_milliseconds
                .saturating_mul(entity_num as u64),
        )
    }
}

impl ConnectionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_milliseconds)
    }
}
