//! Event ingestion handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{PublishEventRequest, Validate};
use crate::app_state::AppState;
use crate::auth::Identity;
use crate::error::{ErrorResponse, HubError};
use crate::service::PublishOutcome;

/// `POST /events` — Publish an event to its target groups.
///
/// # Errors
///
/// Returns [`HubError::Unauthorized`] without a caller identity and
/// [`HubError::InvalidRequest`] when the body fails validation.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Publish an event",
    description = "Stores the event in history (unless `persist` is false) and delivers it once to every connection subscribed to any of `target_groups`. Responds after every delivery was attempted.",
    request_body = PublishEventRequest,
    responses(
        (status = 202, description = "Event accepted", body = PublishOutcome),
        (status = 400, description = "Invalid event", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn publish_event(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<PublishEventRequest>,
) -> Result<impl IntoResponse, HubError> {
    req.validate()?;
    tracing::info!(
        user_id = %identity.user_id,
        event_type = %req.event_type,
        "received event"
    );

    let outcome = state.dispatcher.publish(req.into_event(&identity)).await;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// Event ingestion routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(publish_event))
}
