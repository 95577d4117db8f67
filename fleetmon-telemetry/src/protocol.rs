//! Telemetry protocol structures for agent-hub communication.
//!
//! This module defines the wire format for transmitting telemetry records
//! from node agents to the hub over HTTP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocol version for telemetry format compatibility.
pub const TELEMETRY_PROTOCOL_VERSION: u32 = 1;

/// Unified telemetry record for one node.
///
/// Combines load averages, per-CPU time buckets, memory totals, per-interface
/// traffic rates, and soft-interrupt counters into a single payload.
///
/// The default record carries an empty `node_id` and empty metric sections;
/// consumers treat it as "no data for this node yet".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeTelemetry {
    /// Protocol version for format compatibility.
    pub version: u32,
    /// Externally assigned node identifier. Empty means "no data yet".
    pub node_id: String,
    /// Timestamp when the record was assembled.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Load averages, absent when the load source is unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_load: Option<CpuLoad>,
    /// Per-CPU utilization percentages. The aggregate row is named `cpu`.
    #[serde(default)]
    pub cpu_stats: Vec<CpuStat>,
    /// Memory totals and derived usage, absent when unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryInfo>,
    /// Per-interface traffic rates.
    #[serde(default)]
    pub net_rates: Vec<NetInfo>,
    /// Per-CPU raw soft-interrupt counters.
    #[serde(default)]
    pub soft_irqs: Vec<SoftIrqStat>,
    /// Collection duration in milliseconds.
    pub collection_duration_ms: u64,
}

impl NodeTelemetry {
    /// Create a new, empty record stamped with the current time.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            version: TELEMETRY_PROTOCOL_VERSION,
            node_id: node_id.into(),
            timestamp: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Serialize to JSON for transmission.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON (for debugging).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this record is compatible with the current protocol version.
    pub fn is_compatible(&self) -> bool {
        self.version == TELEMETRY_PROTOCOL_VERSION
    }

    /// A record with an empty node id carries no data.
    pub fn is_empty(&self) -> bool {
        self.node_id.is_empty()
    }

    /// The aggregate `cpu` row, if the CPU collector produced one.
    pub fn aggregate_cpu(&self) -> Option<&CpuStat> {
        self.cpu_stats.iter().find(|s| s.name == "cpu")
    }

    /// Number of per-core rows, excluding the aggregate `cpu` row.
    ///
    /// Never returns zero so load normalization stays well-defined even for
    /// records collected before the CPU source produced per-core rows.
    pub fn core_count(&self) -> usize {
        self.cpu_stats.iter().filter(|s| s.name != "cpu").count().max(1)
    }

    /// Get a summary of the record for logging.
    pub fn summary(&self) -> TelemetrySummary {
        TelemetrySummary {
            node_id: self.node_id.clone(),
            timestamp: self.timestamp,
            cpu_percent: self.aggregate_cpu().map(|s| s.cpu_percent),
            load_1m: self.cpu_load.as_ref().map(|l| l.load_avg_1),
            memory_percent: self.memory.as_ref().map(|m| m.used_percent),
            interfaces: self.net_rates.len(),
        }
    }
}

/// System load averages over 1, 5, and 15 minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuLoad {
    pub load_avg_1: f32,
    pub load_avg_5: f32,
    pub load_avg_15: f32,
}

/// Utilization percentages for one CPU row over the last sampling window.
///
/// `cpu_percent` is the busy share (everything except idle and io_wait); the
/// remaining fields break it down and sum with idle and io_wait to 100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStat {
    /// Row name: `cpu` for the aggregate, `cpu0`, `cpu1`, ... per core.
    pub name: String,
    pub cpu_percent: f64,
    pub user_percent: f64,
    pub system_percent: f64,
    pub nice_percent: f64,
    pub idle_percent: f64,
    pub io_wait_percent: f64,
    pub irq_percent: f64,
    pub soft_irq_percent: f64,
}

/// Memory totals in KiB plus derived usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    /// (total - available) / total, as a percentage. Zero when total is zero.
    pub used_percent: f64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub commit: u64,
    pub commit_limit: u64,
}

/// Traffic rates for one interface over the last sampling window.
/// Byte rates are KB/s, the rest are events per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetInfo {
    pub name: String,
    pub rcv_rate: f64,
    pub rcv_packets_rate: f64,
    pub send_rate: f64,
    pub send_packets_rate: f64,
    pub err_in_rate: f64,
    pub err_out_rate: f64,
    pub drop_in_rate: f64,
    pub drop_out_rate: f64,
}

/// Raw soft-interrupt counters for one CPU. Cumulative since boot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftIrqStat {
    pub cpu: String,
    pub hi: u64,
    pub timer: u64,
    pub net_tx: u64,
    pub net_rx: u64,
    pub block: u64,
    pub irq_poll: u64,
    pub tasklet: u64,
    pub sched: u64,
    pub hrtimer: u64,
    pub rcu: u64,
}

/// Compact summary of a record for logging and quick inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub node_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_1m: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f64>,
    pub interfaces: usize,
}

impl std::fmt::Display for TelemetrySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.node_id)?;

        if let Some(cpu) = self.cpu_percent {
            write!(f, " CPU: {:.1}%", cpu)?;
        }
        if let Some(load) = self.load_1m {
            write!(f, " Load: {:.2}", load)?;
        }
        if let Some(mem) = self.memory_percent {
            write!(f, " Mem: {:.1}%", mem)?;
        }
        write!(f, " Ifaces: {}", self.interfaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_telemetry() -> NodeTelemetry {
        let mut record = NodeTelemetry::new("node-1");
        record.cpu_load = Some(CpuLoad {
            load_avg_1: 2.4,
            load_avg_5: 1.8,
            load_avg_15: 1.5,
        });
        record.cpu_stats = vec![
            CpuStat {
                name: "cpu".to_string(),
                cpu_percent: 45.5,
                user_percent: 30.0,
                system_percent: 15.5,
                idle_percent: 50.0,
                io_wait_percent: 4.5,
                ..Default::default()
            },
            CpuStat {
                name: "cpu0".to_string(),
                cpu_percent: 40.0,
                ..Default::default()
            },
            CpuStat {
                name: "cpu1".to_string(),
                cpu_percent: 51.0,
                ..Default::default()
            },
        ];
        record.memory = Some(MemoryInfo {
            total: 16 * 1024 * 1024,
            free: 4 * 1024 * 1024,
            available: 8 * 1024 * 1024,
            used_percent: 50.0,
            swap_total: 2 * 1024 * 1024,
            swap_used: 512 * 1024,
            commit: 10 * 1024 * 1024,
            commit_limit: 20 * 1024 * 1024,
        });
        record.net_rates = vec![NetInfo {
            name: "eth0".to_string(),
            rcv_rate: 1024.0,
            send_rate: 512.0,
            rcv_packets_rate: 800.0,
            send_packets_rate: 400.0,
            ..Default::default()
        }];
        record.collection_duration_ms = 12;
        record
    }

    #[test]
    fn test_node_telemetry_serialization() {
        let record = make_test_telemetry();

        let json = record.to_json().unwrap();
        assert!(json.contains("node-1"));
        assert!(json.contains("45.5"));

        let parsed = NodeTelemetry::from_json(&json).unwrap();
        assert_eq!(parsed.node_id, "node-1");
        assert_eq!(parsed.version, TELEMETRY_PROTOCOL_VERSION);
        assert!((parsed.aggregate_cpu().unwrap().cpu_percent - 45.5).abs() < 0.01);
        assert_eq!(parsed.net_rates.len(), 1);
    }

    #[test]
    fn test_node_telemetry_pretty_json() {
        let record = make_test_telemetry();
        let pretty = record.to_json_pretty().unwrap();
        assert!(pretty.contains('\n'));
        assert!(pretty.contains("  ")); // Indentation
    }

    #[test]
    fn test_default_record_is_empty() {
        let record = NodeTelemetry::default();
        assert!(record.is_empty());
        assert!(record.cpu_load.is_none());
        assert!(record.cpu_stats.is_empty());
        assert!(record.memory.is_none());
    }

    #[test]
    fn test_new_record_is_stamped_and_not_empty() {
        let record = NodeTelemetry::new("node-7");
        assert!(!record.is_empty());
        assert!(record.timestamp.is_some());
        assert!(record.is_compatible());
    }

    #[test]
    fn test_version_compatibility() {
        let mut record = make_test_telemetry();
        assert!(record.is_compatible());

        record.version = TELEMETRY_PROTOCOL_VERSION + 1;
        assert!(!record.is_compatible());

        record.version = 0;
        assert!(!record.is_compatible());
    }

    #[test]
    fn test_core_count_excludes_aggregate_row() {
        let record = make_test_telemetry();
        assert_eq!(record.core_count(), 2);
    }

    #[test]
    fn test_core_count_never_zero() {
        let record = NodeTelemetry::new("node-1");
        assert_eq!(record.core_count(), 1);
    }

    #[test]
    fn test_summary() {
        let record = make_test_telemetry();
        let summary = record.summary();

        assert_eq!(summary.node_id, "node-1");
        assert!((summary.cpu_percent.unwrap() - 45.5).abs() < 0.01);
        assert!((summary.memory_percent.unwrap() - 50.0).abs() < 0.01);
        assert_eq!(summary.interfaces, 1);

        let display = summary.to_string();
        assert!(display.contains("node-1"));
        assert!(display.contains("CPU: 45.5%"));
        assert!(display.contains("Load: 2.40"));
    }

    #[test]
    fn test_summary_of_sparse_record() {
        let record = NodeTelemetry::new("node-2");
        let summary = record.summary();

        assert!(summary.cpu_percent.is_none());
        assert!(summary.memory_percent.is_none());

        let display = summary.to_string();
        assert!(display.contains("node-2"));
        assert!(!display.contains("CPU:"));
    }

    #[test]
    fn test_backward_compatibility_missing_sections() {
        // A record from an agent that had no working sources at all.
        let minimal_json = r#"{
            "version": 1,
            "node_id": "sparse-node",
            "timestamp": "2026-01-01T00:00:00Z",
            "collection_duration_ms": 3
        }"#;

        let parsed = NodeTelemetry::from_json(minimal_json).unwrap();
        assert_eq!(parsed.node_id, "sparse-node");
        assert!(parsed.cpu_load.is_none());
        assert!(parsed.cpu_stats.is_empty());
        assert!(parsed.soft_irqs.is_empty());
        assert!(parsed.is_compatible());
    }

    #[test]
    fn test_protocol_version_is_one() {
        assert_eq!(TELEMETRY_PROTOCOL_VERSION, 1);
    }
}
