//! In-memory telemetry mailbox.
//!
//! One slot per node, last write wins. The mailbox never evicts: the fleet
//! roster is externally managed and small, and a node that stops reporting
//! keeps serving its final record until it reports again.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use fleetmon_telemetry::NodeTelemetry;

/// Shared per-node record store.
#[derive(Debug, Default)]
pub struct TelemetryMailbox {
    slots: Mutex<HashMap<String, NodeTelemetry>>,
}

impl TelemetryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record under its node id, replacing any previous one.
    pub fn set(&self, record: NodeTelemetry) {
        debug!(node_id = %record.node_id, "Storing telemetry record");
        let mut slots = self.slots.lock().unwrap();
        slots.insert(record.node_id.clone(), record);
    }

    /// Fetch the record for one node.
    ///
    /// A node with no record yet yields the default record, whose empty
    /// `node_id` marks it as "no data".
    pub fn get(&self, node_id: &str) -> NodeTelemetry {
        let slots = self.slots.lock().unwrap();
        slots.get(node_id).cloned().unwrap_or_default()
    }

    /// Ids of every node that has reported at least once, sorted.
    pub fn node_ids(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap();
        let mut ids: Vec<String> = slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of nodes with a stored record.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(node_id: &str, duration_ms: u64) -> NodeTelemetry {
        let mut r = NodeTelemetry::new(node_id);
        r.collection_duration_ms = duration_ms;
        r
    }

    #[test]
    fn test_get_before_set_yields_empty_record() {
        let mailbox = TelemetryMailbox::new();
        let fetched = mailbox.get("node-1");
        assert!(fetched.is_empty());
    }

    #[test]
    fn test_set_then_get() {
        let mailbox = TelemetryMailbox::new();
        mailbox.set(record("node-1", 5));

        let fetched = mailbox.get("node-1");
        assert_eq!(fetched.node_id, "node-1");
        assert_eq!(fetched.collection_duration_ms, 5);
    }

    #[test]
    fn test_last_write_wins() {
        let mailbox = TelemetryMailbox::new();
        mailbox.set(record("node-1", 1));
        mailbox.set(record("node-1", 2));

        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox.get("node-1").collection_duration_ms, 2);
    }

    #[test]
    fn test_nodes_are_isolated() {
        let mailbox = TelemetryMailbox::new();
        mailbox.set(record("node-a", 1));
        mailbox.set(record("node-b", 2));

        assert_eq!(mailbox.get("node-a").collection_duration_ms, 1);
        assert_eq!(mailbox.get("node-b").collection_duration_ms, 2);
        assert!(mailbox.get("node-c").is_empty());
    }

    #[test]
    fn test_node_ids_sorted() {
        let mailbox = TelemetryMailbox::new();
        mailbox.set(record("node-b", 1));
        mailbox.set(record("node-a", 1));
        mailbox.set(record("node-c", 1));

        assert_eq!(mailbox.node_ids(), vec!["node-a", "node-b", "node-c"]);
    }

    #[test]
    fn test_set_is_idempotent_for_identical_records() {
        let mailbox = TelemetryMailbox::new();
        let r = record("node-1", 3);
        mailbox.set(r.clone());
        mailbox.set(r);

        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox.get("node-1").collection_duration_ms, 3);
    }
}
