//! Per-interface traffic rate collection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collect::Collector;
use crate::protocol::{NetInfo, NodeTelemetry};
use crate::rates::{net_rates, NetCounters};
use crate::source::{decode_net_stats, CounterSource};

/// Stateful collector converting per-interface cumulative counters to rates
/// over the window since the previous cycle.
///
/// An interface seen for the first time only establishes its baseline and
/// emits nothing. Baselines persist for the life of the agent; interfaces
/// that disappear keep their last snapshot in case they return.
pub struct NetCollector<S: CounterSource> {
    source: S,
    prev: HashMap<String, (DateTime<Utc>, NetCounters)>,
}

impl<S: CounterSource> NetCollector<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            prev: HashMap::new(),
        }
    }
}

impl<S: CounterSource> Collector for NetCollector<S> {
    fn name(&self) -> &'static str {
        "net_stat"
    }

    fn collect(&mut self, record: &mut NodeTelemetry) {
        let region = match self.source.read_region() {
            Ok(region) => region,
            Err(e) => {
                debug!(collector = self.name(), error = %e, "Source unavailable, skipping");
                return;
            }
        };
        let rows = match decode_net_stats(&region) {
            Ok(rows) => rows,
            Err(e) => {
                debug!(collector = self.name(), error = %e, "Decode failed, skipping");
                return;
            }
        };

        let now = Utc::now();
        for row in rows {
            if let Some((prev_time, prev_counters)) = self.prev.get(&row.name) {
                let dt_secs = (now - *prev_time).num_milliseconds() as f64 / 1000.0;
                let rates = net_rates(&row.counters, Some(prev_counters), dt_secs);
                record.net_rates.push(NetInfo {
                    name: row.name.clone(),
                    rcv_rate: rates.rcv_rate,
                    rcv_packets_rate: rates.rcv_packets_rate,
                    send_rate: rates.send_rate,
                    send_packets_rate: rates.send_packets_rate,
                    err_in_rate: rates.err_in_rate,
                    err_out_rate: rates.err_out_rate,
                    drop_in_rate: rates.drop_in_rate,
                    drop_out_rate: rates.drop_out_rate,
                });
            } else {
                debug!(collector = self.name(), interface = %row.name, "First sight, baseline only");
            }
            self.prev.insert(row.name, (now, row.counters));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testutil::*;
    use crate::source::{StaticRegion, NET_STAT_SLOT_SIZE};
    use tracing::info;
    use tracing_subscriber::fmt;

    fn init_test_logging() {
        let _ = fmt().with_test_writer().try_init();
    }

    #[test]
    fn test_net_collector_first_sight_baseline_only() {
        init_test_logging();
        info!("TEST START: test_net_collector_first_sight_baseline_only");

        let counters = NetCounters {
            rcv_bytes: 1_000_000,
            snd_bytes: 500_000,
            ..Default::default()
        };
        let region = with_sentinel(encode_net_stat_slot("eth0", &counters), NET_STAT_SLOT_SIZE);
        let mut collector = NetCollector::new(StaticRegion::new(region));

        let mut record = NodeTelemetry::new("node-1");
        collector.collect(&mut record);

        assert!(record.net_rates.is_empty());

        info!("TEST PASS: test_net_collector_first_sight_baseline_only");
    }

    #[test]
    fn test_net_collector_rates_from_second_cycle() {
        init_test_logging();
        info!("TEST START: test_net_collector_rates_from_second_cycle");

        let baseline = NetCounters::default();
        let source = StaticRegion::new(with_sentinel(
            encode_net_stat_slot("eth0", &baseline),
            NET_STAT_SLOT_SIZE,
        ));
        let mut collector = NetCollector::new(source.clone());

        let mut record = NodeTelemetry::new("node-1");
        collector.collect(&mut record);
        assert!(record.net_rates.is_empty());

        let grown = NetCounters {
            rcv_bytes: 1024 * 100,
            rcv_packets: 100,
            snd_bytes: 1024 * 50,
            snd_packets: 50,
            ..Default::default()
        };
        source.refresh(with_sentinel(
            encode_net_stat_slot("eth0", &grown),
            NET_STAT_SLOT_SIZE,
        ));
        // Collected almost immediately: dt is tiny, the exact rates are not
        // deterministic here, only their presence and orientation are.
        collector.collect(&mut record);

        assert_eq!(record.net_rates.len(), 1);
        let rates = &record.net_rates[0];
        info!(
            rcv = rates.rcv_rate,
            send = rates.send_rate,
            "RESULT: rates present from second cycle"
        );
        assert_eq!(rates.name, "eth0");
        assert!(rates.rcv_rate >= 0.0 && rates.rcv_rate.is_finite());
        assert!(rates.send_rate >= 0.0 && rates.send_rate.is_finite());
        assert!(rates.rcv_rate >= rates.send_rate);

        info!("TEST PASS: test_net_collector_rates_from_second_cycle");
    }

    #[test]
    fn test_net_collector_interface_appears_mid_run() {
        init_test_logging();

        let source = StaticRegion::new(with_sentinel(
            encode_net_stat_slot("eth0", &NetCounters::default()),
            NET_STAT_SLOT_SIZE,
        ));
        let mut collector = NetCollector::new(source.clone());

        let mut record = NodeTelemetry::new("node-1");
        collector.collect(&mut record);

        let mut both = encode_net_stat_slot(
            "eth0",
            &NetCounters {
                rcv_bytes: 2048,
                ..Default::default()
            },
        );
        both.extend(encode_net_stat_slot("eth1", &NetCounters::default()));
        source.refresh(with_sentinel(both, NET_STAT_SLOT_SIZE));
        collector.collect(&mut record);

        // Only eth0 has a previous snapshot; eth1 sets its baseline.
        assert_eq!(record.net_rates.len(), 1);
        assert_eq!(record.net_rates[0].name, "eth0");
    }
}
