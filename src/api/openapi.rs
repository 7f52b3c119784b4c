//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{GroupListResponse, GroupMembersResponse, HistoryResponse, PublishEventRequest};
use super::handlers::{events, groups, history, system};
use crate::domain::{ConnectionId, Event, NotificationPreferences};
use crate::error::{ErrorBody, ErrorResponse};
use crate::service::PublishOutcome;

/// Path of the generated OpenAPI JSON document.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Generated OpenAPI document.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "notify-hub",
        description = "Group-addressed notification fan-out over WebSocket. Events published over REST are stored in a bounded history and pushed to every connection subscribed to one of their target groups."
    ),
    paths(
        events::publish_event,
        history::global_history,
        history::user_history,
        history::role_history,
        history::group_history,
        groups::list_groups,
        groups::group_members,
        system::health_handler,
    ),
    components(schemas(
        PublishEventRequest,
        PublishOutcome,
        HistoryResponse,
        GroupListResponse,
        GroupMembersResponse,
        Event,
        ConnectionId,
        NotificationPreferences,
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
    )),
    tags(
        (name = "Events", description = "Event ingestion"),
        (name = "History", description = "Event history queries"),
        (name = "Groups", description = "Group membership inspection"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;
