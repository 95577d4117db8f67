//! Telemetry collection for fleetmon nodes.
//!
//! This crate turns monotonically increasing kernel/driver counters, sampled
//! at irregular intervals, into normalized per-node telemetry records.
//!
//! ## Modules
//!
//! - [`rates`]: Pure counter-to-rate conversion (no I/O)
//! - [`source`]: Fixed-layout counter-region decoding and the source trait
//! - [`collect`]: Fragment collectors (CPU, memory, network, soft-IRQ)
//! - [`protocol`]: Wire format for node-to-hub transmission

#![forbid(unsafe_code)]

pub mod collect;
pub mod protocol;
pub mod rates;
pub mod source;

pub use collect::{Collector, DevicePaths, collect_cycle, resolve_node_id};
pub use protocol::{
    CpuLoad, CpuStat, MemoryInfo, NetInfo, NodeTelemetry, SoftIrqStat, TELEMETRY_PROTOCOL_VERSION,
    TelemetrySummary,
};
pub use rates::{CpuPercentages, CpuTicks, NetCounters, NetRates, counter_rate};
pub use source::{CounterSource, FileRegion, SourceError, StaticRegion};
