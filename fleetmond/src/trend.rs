//! Cycle-over-cycle trend tracking.
//!
//! Trends report the relative change of every derived scalar in a node's
//! sample since the previous poll cycle: (current - last) / last, or zero
//! when there is no previous value to compare against. Trends are reported
//! alongside the composite score and never feed back into it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use fleetmon_telemetry::NodeTelemetry;

use crate::score::CompositeScore;

/// The derived scalars a trend is computed over: the aggregate CPU
/// percentage buckets, the load triple, the memory snapshot, node-total
/// network rates, and the composite score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSample {
    pub cpu_percent: f64,
    pub user_percent: f64,
    pub system_percent: f64,
    pub nice_percent: f64,
    pub idle_percent: f64,
    pub io_wait_percent: f64,
    pub irq_percent: f64,
    pub soft_irq_percent: f64,

    pub load_avg_1: f64,
    pub load_avg_5: f64,
    pub load_avg_15: f64,

    pub mem_used_percent: f64,
    pub mem_total: f64,
    pub mem_free: f64,
    pub mem_available: f64,
    pub mem_swap_used: f64,
    pub mem_swap_total: f64,
    pub mem_commit: f64,
    pub mem_commit_limit: f64,

    pub net_rcv_rate: f64,
    pub net_send_rate: f64,
    pub net_drop_in_rate: f64,
    pub net_drop_out_rate: f64,

    pub score: f64,
}

impl TrendSample {
    /// Extract the trended scalars from a record and its score.
    pub fn from_record(record: &NodeTelemetry, score: &CompositeScore) -> Self {
        let mut sample = Self {
            score: score.total,
            ..Self::default()
        };

        if let Some(cpu) = record.aggregate_cpu() {
            sample.cpu_percent = cpu.cpu_percent;
            sample.user_percent = cpu.user_percent;
            sample.system_percent = cpu.system_percent;
            sample.nice_percent = cpu.nice_percent;
            sample.idle_percent = cpu.idle_percent;
            sample.io_wait_percent = cpu.io_wait_percent;
            sample.irq_percent = cpu.irq_percent;
            sample.soft_irq_percent = cpu.soft_irq_percent;
        }

        if let Some(load) = record.cpu_load {
            sample.load_avg_1 = load.load_avg_1 as f64;
            sample.load_avg_5 = load.load_avg_5 as f64;
            sample.load_avg_15 = load.load_avg_15 as f64;
        }

        if let Some(mem) = record.memory.as_ref() {
            sample.mem_used_percent = mem.used_percent;
            sample.mem_total = mem.total as f64;
            sample.mem_free = mem.free as f64;
            sample.mem_available = mem.available as f64;
            sample.mem_swap_used = mem.swap_used as f64;
            sample.mem_swap_total = mem.swap_total as f64;
            sample.mem_commit = mem.commit as f64;
            sample.mem_commit_limit = mem.commit_limit as f64;
        }

        sample.net_rcv_rate = record.net_rates.iter().map(|n| n.rcv_rate).sum();
        sample.net_send_rate = record.net_rates.iter().map(|n| n.send_rate).sum();
        sample.net_drop_in_rate = record.net_rates.iter().map(|n| n.drop_in_rate).sum();
        sample.net_drop_out_rate = record.net_rates.iter().map(|n| n.drop_out_rate).sum();

        sample
    }
}

/// Relative change of each scalar since the previous cycle, one field per
/// `TrendSample` scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub cpu_percent_trend: f64,
    pub user_percent_trend: f64,
    pub system_percent_trend: f64,
    pub nice_percent_trend: f64,
    pub idle_percent_trend: f64,
    pub io_wait_percent_trend: f64,
    pub irq_percent_trend: f64,
    pub soft_irq_percent_trend: f64,

    pub load_avg_1_trend: f64,
    pub load_avg_5_trend: f64,
    pub load_avg_15_trend: f64,

    pub mem_used_percent_trend: f64,
    pub mem_total_trend: f64,
    pub mem_free_trend: f64,
    pub mem_available_trend: f64,
    pub mem_swap_used_trend: f64,
    pub mem_swap_total_trend: f64,
    pub mem_commit_trend: f64,
    pub mem_commit_limit_trend: f64,

    pub net_rcv_rate_trend: f64,
    pub net_send_rate_trend: f64,
    pub net_drop_in_rate_trend: f64,
    pub net_drop_out_rate_trend: f64,

    pub score_trend: f64,
}

impl TrendReport {
    fn between(last: &TrendSample, curr: &TrendSample) -> Self {
        Self {
            cpu_percent_trend: relative_change(curr.cpu_percent, last.cpu_percent),
            user_percent_trend: relative_change(curr.user_percent, last.user_percent),
            system_percent_trend: relative_change(curr.system_percent, last.system_percent),
            nice_percent_trend: relative_change(curr.nice_percent, last.nice_percent),
            idle_percent_trend: relative_change(curr.idle_percent, last.idle_percent),
            io_wait_percent_trend: relative_change(curr.io_wait_percent, last.io_wait_percent),
            irq_percent_trend: relative_change(curr.irq_percent, last.irq_percent),
            soft_irq_percent_trend: relative_change(curr.soft_irq_percent, last.soft_irq_percent),

            load_avg_1_trend: relative_change(curr.load_avg_1, last.load_avg_1),
            load_avg_5_trend: relative_change(curr.load_avg_5, last.load_avg_5),
            load_avg_15_trend: relative_change(curr.load_avg_15, last.load_avg_15),

            mem_used_percent_trend: relative_change(curr.mem_used_percent, last.mem_used_percent),
            mem_total_trend: relative_change(curr.mem_total, last.mem_total),
            mem_free_trend: relative_change(curr.mem_free, last.mem_free),
            mem_available_trend: relative_change(curr.mem_available, last.mem_available),
            mem_swap_used_trend: relative_change(curr.mem_swap_used, last.mem_swap_used),
            mem_swap_total_trend: relative_change(curr.mem_swap_total, last.mem_swap_total),
            mem_commit_trend: relative_change(curr.mem_commit, last.mem_commit),
            mem_commit_limit_trend: relative_change(curr.mem_commit_limit, last.mem_commit_limit),

            net_rcv_rate_trend: relative_change(curr.net_rcv_rate, last.net_rcv_rate),
            net_send_rate_trend: relative_change(curr.net_send_rate, last.net_send_rate),
            net_drop_in_rate_trend: relative_change(curr.net_drop_in_rate, last.net_drop_in_rate),
            net_drop_out_rate_trend: relative_change(
                curr.net_drop_out_rate,
                last.net_drop_out_rate,
            ),

            score_trend: relative_change(curr.score, last.score),
        }
    }
}

/// Relative change: (current - last) / last, zero when last is zero.
fn relative_change(curr: f64, last: f64) -> f64 {
    if last == 0.0 {
        0.0
    } else {
        (curr - last) / last
    }
}

/// Per-node trend state across poll cycles.
#[derive(Debug, Default)]
pub struct TrendTracker {
    last: HashMap<String, TrendSample>,
}

impl TrendTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in this cycle's sample and report the change since the last one.
    ///
    /// A node's first sample yields the zero report.
    pub fn update(&mut self, node_id: &str, sample: TrendSample) -> TrendReport {
        let report = match self.last.get(node_id) {
            Some(last) => TrendReport::between(last, &sample),
            None => TrendReport::default(),
        };
        self.last.insert(node_id.to_string(), sample);
        report
    }
}
