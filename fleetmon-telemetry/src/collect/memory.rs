//! Memory totals collection.

use tracing::debug;

use crate::collect::Collector;
use crate::protocol::{MemoryInfo, NodeTelemetry};
use crate::source::{decode_mem_info, CounterSource};

/// Stateless collector for memory totals. All values are KiB.
pub struct MemoryCollector<S: CounterSource> {
    source: S,
}

impl<S: CounterSource> MemoryCollector<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: CounterSource> Collector for MemoryCollector<S> {
    fn name(&self) -> &'static str {
        "mem_info"
    }

    fn collect(&mut self, record: &mut NodeTelemetry) {
        let region = match self.source.read_region() {
            Ok(region) => region,
            Err(e) => {
                debug!(collector = self.name(), error = %e, "Source unavailable, skipping");
                return;
            }
        };
        let mem = match decode_mem_info(&region) {
            Ok(mem) => mem,
            Err(e) => {
                debug!(collector = self.name(), error = %e, "Decode failed, skipping");
                return;
            }
        };

        let used_percent = if mem.total > 0 {
            (mem.total.saturating_sub(mem.available)) as f64 / mem.total as f64 * 100.0
        } else {
            0.0
        };

        record.memory = Some(MemoryInfo {
            total: mem.total,
            free: mem.free,
            available: mem.available,
            used_percent,
            swap_total: mem.swap_total,
            swap_used: mem.swap_total.saturating_sub(mem.swap_free),
            commit: mem.committed,
            commit_limit: mem.commit_limit,
        });
    }
}
