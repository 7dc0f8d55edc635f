//! Root endpoint handler.
//!
//! Renders the same table the terminal shows, followed by the list of
//! available endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::handlers::connections::ConnectionsQuery;
use crate::render::render_view;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(
    State(state): State<SharedState>,
    Query(query): Query<ConnectionsQuery>,
) -> impl IntoResponse {
    debug!("Processing / request");
    state.record_http_request();

    let view = state.store.view();
    let mut out = render_view(&view, &query.filter(), Utc::now());

    let endpoint = state.config.endpoint();
    writeln!(out).ok();
    writeln!(out, "Proxy API: {}:{}", endpoint.host, endpoint.port).ok();
    writeln!(out, "Endpoints: /connections  /connections/{{id}}  /health  /metrics").ok();
    writeln!(out, "lightsocks-monitor {}", env!("CARGO_PKG_VERSION")).ok();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        out,
    )
}
