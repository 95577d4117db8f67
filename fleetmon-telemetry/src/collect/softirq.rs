//! Per-CPU soft-interrupt counter collection.

use tracing::debug;

use crate::collect::Collector;
use crate::protocol::{NodeTelemetry, SoftIrqStat};
use crate::source::{decode_softirq_stats, CounterSource};

/// Stateless collector for raw soft-interrupt counters.
///
/// Counters are forwarded as-is; consumers needing per-window deltas derive
/// them from consecutive records.
pub struct SoftIrqCollector<S: CounterSource> {
    source: S,
}

impl<S: CounterSource> SoftIrqCollector<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: CounterSource> Collector for SoftIrqCollector<S> {
    fn name(&self) -> &'static str {
        "softirq_stat"
    }

    fn collect(&mut self, record: &mut NodeTelemetry) {
        let region = match self.source.read_region() {
            Ok(region) => region,
            Err(e) => {
                debug!(collector = self.name(), error = %e, "Source unavailable, skipping");
                return;
            }
        };
        match decode_softirq_stats(&region) {
            Ok(rows) => {
                record.soft_irqs = rows
                    .into_iter()
                    .map(|row| SoftIrqStat {
                        cpu: row.name,
                        hi: row.hi,
                        timer: row.timer,
                        net_tx: row.net_tx,
                        net_rx: row.net_rx,
                        block: row.block,
                        irq_poll: row.irq_poll,
                        tasklet: row.tasklet,
                        sched: row.sched,
                        hrtimer: row.hrtimer,
                        rcu: row.rcu,
                    })
                    .collect();
            }
            Err(e) => {
                debug!(collector = self.name(), error = %e, "Decode failed, skipping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testutil::*;
    use crate::source::{StaticRegion, SOFTIRQ_SLOT_SIZE};
    use tracing::info;
    use tracing_subscriber::fmt;

    fn init_test_logging() {
        let _ = fmt().with_test_writer().try_init();
    }

    #[test]
    fn test_softirq_collector_passthrough() {
        init_test_logging();
        info!("TEST START: test_softirq_collector_passthrough");

        let mut region = encode_softirq_slot("cpu0", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        region.extend(encode_softirq_slot("cpu1", &[10, 20, 30, 40, 50, 60, 70, 80, 90, 100]));
        let region = with_sentinel(region, SOFTIRQ_SLOT_SIZE);

        let mut collector = SoftIrqCollector::new(StaticRegion::new(region));
        let mut record = NodeTelemetry::new("node-1");
        collector.collect(&mut record);

        assert_eq!(record.soft_irqs.len(), 2);
        assert_eq!(record.soft_irqs[0].cpu, "cpu0");
        assert_eq!(record.soft_irqs[0].net_rx, 4);
        assert_eq!(record.soft_irqs[1].cpu, "cpu1");
        assert_eq!(record.soft_irqs[1].rcu, 100);

        info!("TEST PASS: test_softirq_collector_passthrough");
    }

    #[test]
    fn test_softirq_collector_short_region() {
        init_test_logging();

        let mut collector = SoftIrqCollector::new(StaticRegion::new(vec![1u8; 10]));
        let mut record = NodeTelemetry::new("node-1");
        collector.collect(&mut record);

        assert!(record.soft_irqs.is_empty());
    }
}
