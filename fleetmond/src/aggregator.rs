//! Fleet aggregation: poll hubs for node telemetry, score each node, and
//! publish the results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::interval;
use tracing::{debug, info, warn};

use fleetmon_common::NodeStatus;
use fleetmon_telemetry::NodeTelemetry;

use crate::score::{CompositeScore, ScoreWeights, composite_score_with_weights};
use crate::sink::Sink;
use crate::trend::{TrendSample, TrendTracker};

/// One node's scored snapshot, as published after a poll cycle.
#[derive(Debug, Clone)]
pub struct AgentScore {
    pub telemetry: NodeTelemetry,
    pub score: CompositeScore,
    pub sampled_at: DateTime<Utc>,
    pub status: NodeStatus,
    /// Hub the record was last fetched from.
    pub hub: String,
}

/// Outcome of fetching one node's telemetry from a hub.
#[derive(Debug)]
pub enum PollOutcome {
    /// The hub answered with a record (possibly the empty default).
    Record(NodeTelemetry),
    /// The request failed or timed out.
    Unreachable,
}

/// In-memory fleet state: last known score per node plus trend baselines.
///
/// Kept separate from the polling loop so cycle semantics are testable
/// without a network.
#[derive(Debug, Default)]
pub struct FleetState {
    scores: HashMap<String, AgentScore>,
    trends: TrendTracker,
}

impl FleetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one node's poll outcome into the fleet state.
    ///
    /// Transport failures mark the node stale but keep its last score.
    /// An empty record means the hub has never heard from the node; any
    /// previous score is kept with status downgraded to no-data.
    pub fn apply(
        &mut self,
        hub: &str,
        node_id: &str,
        outcome: PollOutcome,
        weights: &ScoreWeights,
        sink: &dyn Sink,
    ) {
        match outcome {
            PollOutcome::Unreachable => {
                if let Some(entry) = self.scores.get_mut(node_id) {
                    entry.status = NodeStatus::Stale;
                }
            }
            PollOutcome::Record(record) if record.is_empty() => {
                debug!(node_id, "Hub has no telemetry for node");
                if let Some(entry) = self.scores.get_mut(node_id) {
                    entry.status = NodeStatus::NoData;
                }
            }
            PollOutcome::Record(record) => {
                let score = composite_score_with_weights(&record, weights);
                let sample = TrendSample::from_record(&record, &score);
                let trend = self.trends.update(node_id, sample);

                // The in-memory score is the source of truth; the sink is a
                // best-effort audit log written after publication.
                self.scores.insert(
                    node_id.to_string(),
                    AgentScore {
                        telemetry: record,
                        score: score.clone(),
                        sampled_at: Utc::now(),
                        status: NodeStatus::Fresh,
                        hub: hub.to_string(),
                    },
                );

                if let Err(e) = sink.persist(node_id, &score, &trend) {
                    warn!(node_id, "Failed to persist score: {}", e);
                }
            }
        }
    }

    /// Mark every fresh node last fetched via `hub` as stale. Used when the
    /// hub itself cannot be reached: its nodes' data is aging even though no
    /// per-node fetch failed.
    pub fn mark_hub_stale(&mut self, hub: &str) {
        for entry in self.scores.values_mut() {
            if entry.hub == hub && entry.status == NodeStatus::Fresh {
                entry.status = NodeStatus::Stale;
            }
        }
    }

    /// Mark nodes last fetched via `hub` that are no longer in its roster as
    /// stale. The scores are retained; the fleet roster is externally
    /// managed and a dropped node may come back.
    pub fn reconcile_roster(&mut self, hub: &str, roster: &[String]) {
        for (node_id, entry) in self.scores.iter_mut() {
            if entry.hub == hub
                && entry.status == NodeStatus::Fresh
                && !roster.iter().any(|id| id == node_id)
            {
                debug!(node_id = %node_id, hub, "Node missing from hub roster");
                entry.status = NodeStatus::Stale;
            }
        }
    }

    /// Latest score for a node, if any cycle has produced one.
    pub fn get(&self, node_id: &str) -> Option<AgentScore> {
        self.scores.get(node_id).cloned()
    }

    /// All known node ids, sorted.
    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.scores.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Aggregator polling configuration.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub weights: ScoreWeights,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            weights: ScoreWeights::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodesResponse {
    nodes: Vec<String>,
}

/// Periodic HTTP poller that scores every node known to the configured hubs.
pub struct FleetAggregator {
    hubs: Vec<String>,
    state: Arc<Mutex<FleetState>>,
    sink: Box<dyn Sink>,
    client: reqwest::Client,
    options: AggregatorOptions,
    shutdown: Arc<AtomicBool>,
}

impl FleetAggregator {
    pub fn new(
        hubs: Vec<String>,
        state: Arc<Mutex<FleetState>>,
        sink: Box<dyn Sink>,
        options: AggregatorOptions,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let hubs = hubs
            .into_iter()
            .map(|h| h.trim_end_matches('/').to_string())
            .collect();
        Self {
            hubs,
            state,
            sink,
            client: reqwest::Client::new(),
            options,
            shutdown,
        }
    }

    /// Start the polling loop in the background. Exits at the next cycle
    /// boundary after the shutdown flag is set.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.options.poll_interval);
            loop {
                ticker.tick().await;
                if self.shutdown.load(Ordering::Relaxed) {
                    info!("Aggregator shutting down");
                    return;
                }
                self.poll_cycle().await;
            }
        })
    }

    /// One full cycle: list nodes on every hub, fetch each node's record,
    /// score it, and publish.
    async fn poll_cycle(&self) {
        for hub in &self.hubs {
            let node_ids = match self.list_nodes(hub).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(hub, "Failed to list nodes: {}", e);
                    let mut state = self.state.lock().expect("fleet state lock");
                    state.mark_hub_stale(hub);
                    continue;
                }
            };

            {
                let mut state = self.state.lock().expect("fleet state lock");
                state.reconcile_roster(hub, &node_ids);
            }

            for node_id in node_ids {
                let outcome = self.fetch_node(hub, &node_id).await;
                let mut state = self.state.lock().expect("fleet state lock");
                state.apply(hub, &node_id, outcome, &self.options.weights, self.sink.as_ref());
            }
        }

        let state = self.state.lock().expect("fleet state lock");
        for node_id in state.node_ids() {
            if let Some(entry) = state.get(&node_id) {
                debug!(
                    node_id = %node_id,
                    total = entry.score.total,
                    rating = %entry.score.rating(),
                    status = %entry.status,
                    sampled_at = %entry.sampled_at,
                    summary = %entry.telemetry.summary(),
                    "Node scored"
                );
            }
        }
        info!(nodes = state.len(), "Poll cycle complete");
    }

    async fn list_nodes(&self, hub: &str) -> anyhow::Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/v1/nodes", hub))
            .timeout(self.options.request_timeout)
            .send()
            .await?
            .error_for_status()?;
        let body: NodesResponse = response.json().await?;
        Ok(body.nodes)
    }

    async fn fetch_node(&self, hub: &str, node_id: &str) -> PollOutcome {
        let url = format!("{}/v1/telemetry/{}", hub, node_id);
        let result = self
            .client
            .get(&url)
            .timeout(self.options.request_timeout)
            .send()
            .await;

        let response = match result {
            Ok(resp) => resp,
            Err(e) => {
                warn!(node_id, hub, "Telemetry fetch failed: {}", e);
                return PollOutcome::Unreachable;
            }
        };

        if !response.status().is_success() {
            warn!(
                node_id,
                hub,
                status = %response.status(),
                "Telemetry fetch returned error status"
            );
            return PollOutcome::Unreachable;
        }

        match response.json::<NodeTelemetry>().await {
            Ok(record) => {
                if !record.is_empty() && !record.is_compatible() {
                    warn!(node_id, "Telemetry protocol version mismatch");
                }
                PollOutcome::Record(record)
            }
            Err(e) => {
                warn!(node_id, "Failed to parse telemetry JSON: {}", e);
                PollOutcome::Unreachable
            }
        }
    }
}
