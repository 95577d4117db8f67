//! Composite health score calculation.
//!
//! Each component is turned into a headroom sub-score: 1 minus the observed
//! value over its reference capacity, floored at zero. The weighted sum is
//! scaled to 0-100, so an idle node scores 100 and a saturated one 0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use fleetmon_telemetry::NodeTelemetry;

/// Current version of the scoring algorithm.
/// Increment when the calculation changes to invalidate persisted history.
pub const SCORE_VERSION: u32 = 1;

/// Reference network bandwidth: 1 Gbit/s in bytes per second.
pub const REFERENCE_BANDWIDTH_BYTES: f64 = 125_000_000.0;

/// Weights for each score component.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreWeights {
    /// CPU busy fraction weight.
    pub cpu: f64,
    /// Per-core 1-minute load weight.
    pub load: f64,
    /// Memory usage weight.
    pub memory: f64,
    /// Inbound traffic weight.
    pub net_in: f64,
    /// Outbound traffic weight.
    pub net_out: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            cpu: 0.40,
            load: 0.30,
            memory: 0.20,
            net_in: 0.05,
            net_out: 0.05,
        }
    }
}

impl ScoreWeights {
    /// Validate that weights sum to 1.0 (within tolerance).
    pub fn is_valid(&self) -> bool {
        let sum = self.cpu + self.load + self.memory + self.net_in + self.net_out;
        (sum - 1.0).abs() < 0.001
    }
}

/// Composite score with its per-component breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Overall score (0-100). Higher means more headroom.
    pub total: f64,

    /// CPU headroom sub-score (0-1).
    pub cpu_score: f64,
    /// Load headroom sub-score (0-1).
    pub load_score: f64,
    /// Memory headroom sub-score (0-1).
    pub memory_score: f64,
    /// Inbound network headroom sub-score (0-1).
    pub net_in_score: f64,
    /// Outbound network headroom sub-score (0-1).
    pub net_out_score: f64,

    /// Weights used for this calculation.
    pub weights: ScoreWeights,

    /// Timestamp when the score was calculated.
    pub calculated_at: DateTime<Utc>,

    /// Algorithm version.
    pub version: u32,
}

impl Default for CompositeScore {
    fn default() -> Self {
        Self {
            total: 0.0,
            cpu_score: 0.0,
            load_score: 0.0,
            memory_score: 0.0,
            net_in_score: 0.0,
            net_out_score: 0.0,
            weights: ScoreWeights::default(),
            calculated_at: Utc::now(),
            version: SCORE_VERSION,
        }
    }
}

impl CompositeScore {
    /// Human-readable rating for the total score.
    pub fn rating(&self) -> &'static str {
        match self.total {
            x if x >= 90.0 => "Idle",
            x if x >= 70.0 => "Light",
            x if x >= 40.0 => "Moderate",
            x if x >= 15.0 => "Heavy",
            _ => "Saturated",
        }
    }

    /// Check if this score was produced by an older algorithm version.
    pub fn is_outdated(&self) -> bool {
        self.version != SCORE_VERSION
    }
}

/// Headroom sub-score: 1 - observed/reference, floored at zero.
///
/// Observations beyond the reference (load above core count, traffic above
/// line rate) contribute zero rather than going negative.
fn headroom(observed: f64, reference: f64) -> f64 {
    if reference <= 0.0 {
        return 0.0;
    }
    (1.0 - observed / reference).max(0.0)
}

/// Calculate the composite score for one node record with default weights.
pub fn composite_score(record: &NodeTelemetry) -> CompositeScore {
    composite_score_with_weights(record, &ScoreWeights::default())
}

/// Calculate the composite score for one node record.
///
/// Missing sections contribute a zero sub-score: a node that reports nothing
/// for a component is treated as having no measured headroom there.
pub fn composite_score_with_weights(
    record: &NodeTelemetry,
    weights: &ScoreWeights,
) -> CompositeScore {
    let cpu_score = record
        .aggregate_cpu()
        .map(|s| headroom(s.cpu_percent, 100.0))
        .unwrap_or(0.0);

    let load_score = record
        .cpu_load
        .map(|l| headroom(l.load_avg_1 as f64, record.core_count() as f64))
        .unwrap_or(0.0);

    let memory_score = record
        .memory
        .as_ref()
        .map(|m| headroom(m.used_percent, 100.0))
        .unwrap_or(0.0);

    // Interface rates are KB/s; sum across interfaces against line rate.
    let rcv_bytes_per_sec: f64 = record.net_rates.iter().map(|n| n.rcv_rate * 1024.0).sum();
    let snd_bytes_per_sec: f64 = record.net_rates.iter().map(|n| n.send_rate * 1024.0).sum();
    let net_in_score = headroom(rcv_bytes_per_sec, REFERENCE_BANDWIDTH_BYTES);
    let net_out_score = headroom(snd_bytes_per_sec, REFERENCE_BANDWIDTH_BYTES);

    let total = (cpu_score * weights.cpu
        + load_score * weights.load
        + memory_score * weights.memory
        + net_in_score * weights.net_in
        + net_out_score * weights.net_out)
        * 100.0;

    debug!(
        node_id = %record.node_id,
        total = format!("{:.1}", total),
        cpu = format!("{:.2}", cpu_score),
        load = format!("{:.2}", load_score),
        memory = format!("{:.2}", memory_score),
        "Composite score calculated"
    );

    CompositeScore {
        total: total.clamp(0.0, 100.0),
        cpu_score,
        load_score,
        memory_score,
        net_in_score,
        net_out_score,
        weights: *weights,
        calculated_at: Utc::now(),
        version: SCORE_VERSION,
    }
}
