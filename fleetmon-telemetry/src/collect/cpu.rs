//! CPU load-average and per-CPU utilization collection.

use std::collections::HashMap;

use tracing::debug;

use crate::collect::Collector;
use crate::protocol::{CpuLoad, CpuStat, NodeTelemetry};
use crate::rates::{cpu_percentages, CpuTicks};
use crate::source::{decode_cpu_load, decode_cpu_stats, CounterSource};

/// Stateless collector for the 1/5/15-minute load averages.
pub struct CpuLoadCollector<S: CounterSource> {
    source: S,
}

impl<S: CounterSource> CpuLoadCollector<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: CounterSource> Collector for CpuLoadCollector<S> {
    fn name(&self) -> &'static str {
        "cpu_load"
    }

    fn collect(&mut self, record: &mut NodeTelemetry) {
        let region = match self.source.read_region() {
            Ok(region) => region,
            Err(e) => {
                debug!(collector = self.name(), error = %e, "Source unavailable, skipping");
                return;
            }
        };
        match decode_cpu_load(&region) {
            Ok(load) => {
                record.cpu_load = Some(CpuLoad {
                    load_avg_1: load.load_avg_1,
                    load_avg_5: load.load_avg_5,
                    load_avg_15: load.load_avg_15,
                });
            }
            Err(e) => {
                debug!(collector = self.name(), error = %e, "Decode failed, skipping");
            }
        }
    }
}

/// Stateful collector converting per-CPU time-bucket counters to
/// percentages over the window since the previous cycle.
///
/// A CPU row seen for the first time only establishes its baseline and emits
/// nothing. Baselines are kept for the life of the agent; the CPU topology of
/// a node does not shrink, so the cache is never evicted.
pub struct CpuStatCollector<S: CounterSource> {
    source: S,
    prev: HashMap<String, CpuTicks>,
}

impl<S: CounterSource> CpuStatCollector<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            prev: HashMap::new(),
        }
    }
}

impl<S: CounterSource> Collector for CpuStatCollector<S> {
    fn name(&self) -> &'static str {
        "cpu_stat"
    }

    fn collect(&mut self, record: &mut NodeTelemetry) {
        let region = match self.source.read_region() {
            Ok(region) => region,
            Err(e) => {
                debug!(collector = self.name(), error = %e, "Source unavailable, skipping");
                return;
            }
        };
        let rows = match decode_cpu_stats(&region) {
            Ok(rows) => rows,
            Err(e) => {
                debug!(collector = self.name(), error = %e, "Decode failed, skipping");
                return;
            }
        };

        for row in rows {
            if let Some(prev) = self.prev.get(&row.name) {
                let pct = cpu_percentages(&row.ticks, prev);
                record.cpu_stats.push(CpuStat {
                    name: row.name.clone(),
                    cpu_percent: pct.busy,
                    user_percent: pct.user,
                    system_percent: pct.system,
                    nice_percent: pct.nice,
                    idle_percent: pct.idle,
                    io_wait_percent: pct.io_wait,
                    irq_percent: pct.irq,
                    soft_irq_percent: pct.soft_irq,
                });
            } else {
                debug!(collector = self.name(), cpu = %row.name, "First sight, baseline only");
            }
            self.prev.insert(row.name, row.ticks);
        }
    }
}
