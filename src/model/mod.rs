//! Plain data: configuration, server state and status reports.

pub mod config;
pub mod state;
pub mod status;

pub use self::config::*;
pub use state::*;
pub use status::*;
