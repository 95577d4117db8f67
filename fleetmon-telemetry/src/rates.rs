//! Counter-to-rate conversion.
//!
//! Pure functions turning pairs of monotonic counter snapshots into
//! normalized rates. No I/O, no hidden state: identical inputs always
//! produce identical outputs.

use serde::{Deserialize, Serialize};

/// Rate of an additive counter (bytes, packets, errors, drops) per second.
///
/// Counter resets (producer restart, wrap) show up as `curr < prev` and are
/// reported as 0 via saturating subtraction, never as a negative rate.
/// A non-positive `dt_secs` yields 0.
pub fn counter_rate(curr: u64, prev: u64, dt_secs: f64) -> f64 {
    if dt_secs <= 0.0 {
        return 0.0;
    }
    curr.saturating_sub(prev) as f64 / dt_secs
}

/// Cumulative CPU time buckets for one logical CPU.
///
/// Values are cumulative since boot, in whatever unit the producer uses;
/// only deltas between two snapshots matter.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CpuTicks {
    pub user: f64,
    pub system: f64,
    pub idle: f64,
    pub nice: f64,
    pub io_wait: f64,
    pub irq: f64,
    pub soft_irq: f64,
    pub steal: f64,
    pub guest: f64,
    pub guest_nice: f64,
}

impl CpuTicks {
    /// Total time accounted across the buckets that enter the percentage
    /// denominator. Guest time is already included in user/nice.
    fn total(&self) -> f64 {
        self.user
            + self.system
            + self.idle
            + self.nice
            + self.io_wait
            + self.irq
            + self.soft_irq
            + self.steal
    }

    /// Time spent doing work (everything but idle and io_wait).
    fn busy(&self) -> f64 {
        self.user + self.system + self.nice + self.irq + self.soft_irq + self.steal
    }
}

/// Percentage breakdown of one CPU over a sampling window.
///
/// All fields share the same `Δtotal` denominator, so they are internally
/// consistent: busy + idle + io_wait sums close to 100% modulo float error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CpuPercentages {
    pub busy: f64,
    pub user: f64,
    pub system: f64,
    pub nice: f64,
    pub idle: f64,
    pub io_wait: f64,
    pub irq: f64,
    pub soft_irq: f64,
}

/// Compute the percentage breakdown between two cumulative snapshots.
///
/// A zero or negative `Δtotal` (first sample after a producer reset, or two
/// reads inside the same tick) yields an all-zero record rather than NaN.
pub fn cpu_percentages(curr: &CpuTicks, prev: &CpuTicks) -> CpuPercentages {
    let d_total = curr.total() - prev.total();
    if d_total <= 0.0 {
        return CpuPercentages::default();
    }

    let pct = |c: f64, p: f64| -> f64 { ((c - p).max(0.0) / d_total) * 100.0 };

    CpuPercentages {
        busy: ((curr.busy() - prev.busy()).max(0.0) / d_total) * 100.0,
        user: pct(curr.user, prev.user),
        system: pct(curr.system, prev.system),
        nice: pct(curr.nice, prev.nice),
        idle: pct(curr.idle, prev.idle),
        io_wait: pct(curr.io_wait, prev.io_wait),
        irq: pct(curr.irq, prev.irq),
        soft_irq: pct(curr.soft_irq, prev.soft_irq),
    }
}

/// Cumulative per-interface traffic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetCounters {
    pub rcv_bytes: u64,
    pub rcv_packets: u64,
    pub err_in: u64,
    pub drop_in: u64,
    pub snd_bytes: u64,
    pub snd_packets: u64,
    pub err_out: u64,
    pub drop_out: u64,
}

/// Per-interface rates derived from two counter snapshots.
///
/// Byte rates are KB/s (divided by 1024); packet, error, and drop rates are
/// events per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NetRates {
    pub rcv_rate: f64,
    pub rcv_packets_rate: f64,
    pub send_rate: f64,
    pub send_packets_rate: f64,
    pub err_in_rate: f64,
    pub err_out_rate: f64,
    pub drop_in_rate: f64,
    pub drop_out_rate: f64,
}

/// Compute interface rates between two snapshots.
///
/// `prev` absent (first observation of the interface) or `dt_secs <= 0`
/// yields an all-zero record.
pub fn net_rates(curr: &NetCounters, prev: Option<&NetCounters>, dt_secs: f64) -> NetRates {
    let Some(prev) = prev else {
        return NetRates::default();
    };
    if dt_secs <= 0.0 {
        return NetRates::default();
    }

    NetRates {
        rcv_rate: counter_rate(curr.rcv_bytes, prev.rcv_bytes, dt_secs) / 1024.0,
        rcv_packets_rate: counter_rate(curr.rcv_packets, prev.rcv_packets, dt_secs),
        send_rate: counter_rate(curr.snd_bytes, prev.snd_bytes, dt_secs) / 1024.0,
        send_packets_rate: counter_rate(curr.snd_packets, prev.snd_packets, dt_secs),
        err_in_rate: counter_rate(curr.err_in, prev.err_in, dt_secs),
        err_out_rate: counter_rate(curr.err_out, prev.err_out, dt_secs),
        drop_in_rate: counter_rate(curr.drop_in, prev.drop_in, dt_secs),
        drop_out_rate: counter_rate(curr.drop_out, prev.drop_out, dt_secs),
    }
}
