//! System metrics collection from producer-owned counter regions.
//!
//! Each collector reads one metric family's binary region, decodes it, and
//! fills the matching section of a [`NodeTelemetry`] record. Collectors are
//! fail-silent: an unavailable or malformed source leaves its section empty
//! for that cycle and the rest of the record is still assembled.

pub mod cpu;
pub mod memory;
pub mod network;
pub mod softirq;

use std::path::PathBuf;
use std::time::Instant;

use tracing::debug;

use crate::protocol::NodeTelemetry;
use crate::source::FileRegion;

pub use cpu::{CpuLoadCollector, CpuStatCollector};
pub use memory::MemoryCollector;
pub use network::NetCollector;
pub use softirq::SoftIrqCollector;

/// One metric family's collector.
///
/// Stateful collectors (CPU time buckets, interface counters) keep their
/// previous snapshot internally and emit nothing for an entry they are seeing
/// for the first time.
pub trait Collector: Send {
    /// Metric family name for logging.
    fn name(&self) -> &'static str;

    /// Fill this collector's section of the record.
    fn collect(&mut self, record: &mut NodeTelemetry);
}

/// Device node paths for the counter region producers.
#[derive(Debug, Clone)]
pub struct DevicePaths {
    pub cpu_load: PathBuf,
    pub cpu_stat: PathBuf,
    pub softirq: PathBuf,
    pub net_stat: PathBuf,
    pub mem_info: PathBuf,
}

impl Default for DevicePaths {
    fn default() -> Self {
        Self {
            cpu_load: PathBuf::from("/dev/cpu_load_monitor"),
            cpu_stat: PathBuf::from("/dev/cpu_stat_monitor"),
            softirq: PathBuf::from("/dev/cpu_softirq_monitor"),
            net_stat: PathBuf::from("/dev/net_stat_monitor"),
            mem_info: PathBuf::from("/dev/mem_info_monitor"),
        }
    }
}

impl DevicePaths {
    /// Build the full collector set reading from these device nodes.
    pub fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(CpuLoadCollector::new(FileRegion::new(&self.cpu_load))),
            Box::new(CpuStatCollector::new(FileRegion::new(&self.cpu_stat))),
            Box::new(SoftIrqCollector::new(FileRegion::new(&self.softirq))),
            Box::new(MemoryCollector::new(FileRegion::new(&self.mem_info))),
            Box::new(NetCollector::new(FileRegion::new(&self.net_stat))),
        ]
    }
}

/// Run every collector once and assemble a timed record.
pub fn collect_cycle(collectors: &mut [Box<dyn Collector>], node_id: &str) -> NodeTelemetry {
    let start = Instant::now();
    let mut record = NodeTelemetry::new(node_id);

    for collector in collectors.iter_mut() {
        collector.collect(&mut record);
    }

    record.collection_duration_ms = start.elapsed().as_millis() as u64;
    debug!(
        node_id = %record.node_id,
        duration_ms = record.collection_duration_ms,
        "Collection cycle complete"
    );
    record
}

/// Resolve the node identity the agent reports under.
///
/// Precedence: explicit value (CLI flag), then the `FLEETMON_NODE_ID`
/// environment variable, then `HOSTNAME`, then a fixed fallback.
pub fn resolve_node_id(explicit: Option<String>) -> String {
    explicit
        .filter(|id| !id.is_empty())
        .or_else(|| std::env::var("FLEETMON_NODE_ID").ok().filter(|id| !id.is_empty()))
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|id| !id.is_empty()))
        .unwrap_or_else(|| "unknown-node".to_string())
}
