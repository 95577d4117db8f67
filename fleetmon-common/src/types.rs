//! Common types used across fleetmon components.

use serde::{Deserialize, Serialize};

/// Unique identifier for a node in the fleet.
///
/// Assigned externally (flag or environment), never derived from an OS
/// account name; the identifier keys telemetry records and scores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty identifier marks a "no data yet" record.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Freshness of a node's last known score, as seen by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Last poll succeeded and returned data.
    #[default]
    Fresh,
    /// Last poll failed; the retained score is from an earlier cycle.
    Stale,
    /// The node has never reported data.
    NoData,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Fresh => write!(f, "fresh"),
            NodeStatus::Stale => write!(f, "stale"),
            NodeStatus::NoData => write!(f, "no-data"),
        }
    }
}
