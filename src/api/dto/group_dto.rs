//! Group membership DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::ConnectionId;

/// Response body for `GET /groups`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupListResponse {
    /// Groups with at least one member, sorted.
    pub groups: Vec<String>,
    /// Number of groups.
    pub count: usize,
}

/// Response body for `GET /groups/{group}/members`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupMembersResponse {
    /// Group name.
    pub group: String,
    /// Member connections, sorted.
    pub members: Vec<ConnectionId>,
    /// Number of members.
    pub count: usize,
}
