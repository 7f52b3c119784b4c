//! History query handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{GroupHistoryParams, HistoryResponse, LimitParams};
use crate::app_state::AppState;
use crate::domain::Event;
use crate::service::parse_group_list;

fn respond(events: Vec<Arc<Event>>) -> Json<HistoryResponse> {
    Json(HistoryResponse::new(
        events.iter().map(|e| e.as_ref().clone()).collect(),
    ))
}

/// `GET /history` — Most recent events across all groups.
#[utoipa::path(
    get,
    path = "/api/v1/history",
    tag = "History",
    summary = "Query global history",
    params(LimitParams),
    responses(
        (status = 200, description = "Events, newest first", body = HistoryResponse),
    )
)]
pub async fn global_history(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    let limit = state.config.clamp_limit(params.limit);
    respond(state.history.query_global(limit).await)
}

/// `GET /history/users/{user_id}` — Events published by one user.
#[utoipa::path(
    get,
    path = "/api/v1/history/users/{user_id}",
    tag = "History",
    summary = "Query history by publisher",
    params(
        ("user_id" = String, Path, description = "Publishing user id"),
        LimitParams,
    ),
    responses(
        (status = 200, description = "Events, newest first", body = HistoryResponse),
    )
)]
pub async fn user_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    let limit = state.config.clamp_limit(params.limit);
    respond(state.history.query_by_user(&user_id, limit).await)
}

/// `GET /history/roles/{role}` — Events published under one role.
#[utoipa::path(
    get,
    path = "/api/v1/history/roles/{role}",
    tag = "History",
    summary = "Query history by publisher role",
    params(
        ("role" = String, Path, description = "Publisher role"),
        LimitParams,
    ),
    responses(
        (status = 200, description = "Events, newest first", body = HistoryResponse),
    )
)]
pub async fn role_history(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    let limit = state.config.clamp_limit(params.limit);
    respond(state.history.query_by_role(&role, limit).await)
}

/// `GET /history/groups?groups=a,b` — Events targeting any listed group.
///
/// A missing or blank `groups` parameter yields an empty result.
#[utoipa::path(
    get,
    path = "/api/v1/history/groups",
    tag = "History",
    summary = "Query history by target group",
    params(GroupHistoryParams),
    responses(
        (status = 200, description = "Events, newest first", body = HistoryResponse),
    )
)]
pub async fn group_history(
    State(state): State<AppState>,
    Query(params): Query<GroupHistoryParams>,
) -> impl IntoResponse {
    let groups = params
        .groups
        .as_deref()
        .map(parse_group_list)
        .unwrap_or_default();
    let limit = state.config.clamp_limit(params.limit);
    respond(state.history.query_by_groups(&groups, limit).await)
}

/// History routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/history", get(global_history))
        .route("/history/users/{user_id}", get(user_history))
        .route("/history/roles/{role}", get(role_history))
        .route("/history/groups", get(group_history))
}
