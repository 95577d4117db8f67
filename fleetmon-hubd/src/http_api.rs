//! HTTP API for telemetry ingest and retrieval.
//!
//! Provides:
//! - `POST /v1/telemetry` - store a node's record (last write wins)
//! - `GET /v1/telemetry/{node_id}` - fetch one node's latest record
//! - `GET /v1/nodes` - list nodes that have reported
//! - `/health` - basic daemon health check

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{debug, warn};

use fleetmon_telemetry::{NodeTelemetry, TELEMETRY_PROTOCOL_VERSION};

use crate::mailbox::TelemetryMailbox;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Per-node record store.
    pub mailbox: Arc<TelemetryMailbox>,
    /// Daemon version.
    pub version: &'static str,
    /// Daemon start time.
    pub started_at: Instant,
}

impl HttpState {
    pub fn new(mailbox: Arc<TelemetryMailbox>) -> Self {
        Self {
            mailbox,
            version: env!("CARGO_PKG_VERSION"),
            started_at: Instant::now(),
        }
    }
}

/// Create the HTTP router for the hub.
pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .route("/v1/telemetry", post(ingest_handler))
        .route("/v1/telemetry/:node_id", get(fetch_handler))
        .route("/v1/nodes", get(nodes_handler))
        .route("/health", get(health_handler))
        .with_state(Arc::new(state))
}

/// Handler for `POST /v1/telemetry` - store a record.
///
/// Records with an empty node id or an incompatible protocol version are
/// rejected; everything else replaces the node's previous record.
async fn ingest_handler(
    State(state): State<Arc<HttpState>>,
    Json(record): Json<NodeTelemetry>,
) -> impl IntoResponse {
    if record.is_empty() {
        warn!("Rejecting record with empty node id");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "node_id must not be empty" })),
        );
    }
    if !record.is_compatible() {
        warn!(
            node_id = %record.node_id,
            version = record.version,
            "Rejecting record with incompatible protocol version"
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "incompatible protocol version",
                "expected": TELEMETRY_PROTOCOL_VERSION,
                "got": record.version,
            })),
        );
    }

    debug!(node_id = %record.node_id, "Record accepted");
    state.mailbox.set(record);
    (StatusCode::OK, Json(json!({ "status": "stored" })))
}

/// Handler for `GET /v1/telemetry/{node_id}` - fetch one node's record.
///
/// Always 200: a node that has not reported yields the empty record, which
/// consumers recognize by its empty node id.
async fn fetch_handler(
    State(state): State<Arc<HttpState>>,
    Path(node_id): Path<String>,
) -> impl IntoResponse {
    Json(state.mailbox.get(&node_id))
}

/// Handler for `GET /v1/nodes` - list nodes that have reported.
async fn nodes_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(json!({ "nodes": state.mailbox.node_ids() }))
}

/// Handler for `/health` - basic daemon health check.
async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": state.version,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "nodes": state.mailbox.len(),
    }))
}
