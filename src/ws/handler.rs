//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::auth::Identity;
use crate::service::parse_group_list;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Comma-separated groups to join on connect.
    #[serde(default)]
    pub groups: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// Rejected with 401 before the upgrade when no user identity is present.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    let groups = params
        .groups
        .as_deref()
        .map(parse_group_list)
        .unwrap_or_default();

    ws.on_upgrade(move |socket| run_connection(socket, state, identity, groups))
}
