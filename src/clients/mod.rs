//! Transports that connect an entity to the target service.

pub mod http;
pub mod simulated;
pub mod transport;

pub use http::*;
pub use simulated::*;
pub use transport::*;

use crate::model::{LoadTestConfig, TransportKind};
use std::sync::Arc;

/// The provider selected by `transport` in the configuration.
pub fn provider_for(config: &LoadTestConfig) -> Arc<dyn TransportProvider> {
    match config.transport {
        TransportKind::Http => Arc::new(HttpTransports),
        TransportKind::Simulated => Arc::new(SimulatedTransports::new(config.simulated.clone())),
    }
}
