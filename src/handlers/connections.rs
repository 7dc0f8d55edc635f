//! JSON endpoints for the connection table.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lightsocks_monitor::{ConnectionsView, Totals, TrackedConnection};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::render::RowFilter;
use crate::state::SharedState;

/// Optional row filters accepted by `/` and `/connections`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectionsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub open_only: bool,
}

impl ConnectionsQuery {
    pub fn filter(&self) -> RowFilter {
        RowFilter {
            kind: self.kind.clone(),
            open_only: self.open_only,
        }
    }
}

#[derive(Serialize)]
struct ConnectionsResponse<'a> {
    totals: Totals,
    keep_closed: bool,
    revision: u64,
    stream_restarts: u64,
    open: usize,
    closed: usize,
    connections: Vec<&'a TrackedConnection>,
}

impl<'a> ConnectionsResponse<'a> {
    fn new(view: &'a ConnectionsView, filter: &RowFilter) -> Self {
        Self {
            totals: view.totals,
            keep_closed: view.keep_closed,
            revision: view.revision,
            stream_restarts: view.stream_restarts,
            open: view.open_count(),
            closed: view.closed_count(),
            connections: view.rows.iter().filter(|r| filter.matches(r)).collect(),
        }
    }
}

/// Handler for the /connections endpoint.
#[instrument(skip(state))]
pub async fn connections_handler(
    State(state): State<SharedState>,
    Query(query): Query<ConnectionsQuery>,
) -> Response {
    debug!("Processing /connections request");
    state.record_http_request();

    let view = state.store.view();
    Json(ConnectionsResponse::new(&view, &query.filter())).into_response()
}

/// Handler for the /connections/{id} endpoint.
#[instrument(skip(state))]
pub async fn connection_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Response {
    debug!("Processing /connections/{} request", id);
    state.record_http_request();

    match state.store.find(&id) {
        Some(row) => Json(row).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("Connection {} not found\n", id),
        )
            .into_response(),
    }
}

/// Handler for `DELETE /connections/closed`: drops closed rows.
#[instrument(skip(state))]
pub async fn clear_closed_handler(State(state): State<SharedState>) -> Response {
    debug!("Processing DELETE /connections/closed request");
    state.record_http_request();

    let removed = state.store.clear_closed();
    Json(serde_json::json!({ "removed": removed })).into_response()
}

/// Handler for `POST /keep-closed`: flips the retention preference.
#[instrument(skip(state))]
pub async fn toggle_keep_closed_handler(State(state): State<SharedState>) -> Response {
    debug!("Processing POST /keep-closed request");
    state.record_http_request();

    let keep_closed = state.store.toggle_save();
    Json(serde_json::json!({ "keep_closed": keep_closed })).into_response()
}
