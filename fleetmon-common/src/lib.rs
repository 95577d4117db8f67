//! Fleetmon - Common Library
//!
//! Shared types and logging initialization used by the node agent,
//! the telemetry hub, and the fleet aggregator daemon.

#![forbid(unsafe_code)]

pub mod logging;
pub mod types;

pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use types::{NodeId, NodeStatus};
