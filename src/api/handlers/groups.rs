//! Group membership inspection handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{GroupListResponse, GroupMembersResponse};
use crate::app_state::AppState;

/// `GET /groups` — Groups that currently have members.
#[utoipa::path(
    get,
    path = "/api/v1/groups",
    tag = "Groups",
    summary = "List active groups",
    responses(
        (status = 200, description = "Active groups", body = GroupListResponse),
    )
)]
pub async fn list_groups(State(state): State<AppState>) -> impl IntoResponse {
    let groups: Vec<String> = state.registry.all_groups().await.into_iter().collect();
    Json(GroupListResponse {
        count: groups.len(),
        groups,
    })
}

/// `GET /groups/{group}/members` — Connections subscribed to a group.
///
/// An unknown group has no members and yields an empty list.
#[utoipa::path(
    get,
    path = "/api/v1/groups/{group}/members",
    tag = "Groups",
    summary = "List group members",
    params(
        ("group" = String, Path, description = "Group name"),
    ),
    responses(
        (status = 200, description = "Member connections", body = GroupMembersResponse),
    )
)]
pub async fn group_members(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> impl IntoResponse {
    let mut members: Vec<_> = state.registry.group_members(&group).await.into_iter().collect();
    members.sort();
    Json(GroupMembersResponse {
        count: members.len(),
        group,
        members,
    })
}

/// Group routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/groups", get(list_groups))
        .route("/groups/{group}/members", get(group_members))
}
