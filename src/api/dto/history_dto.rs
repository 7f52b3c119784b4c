//! History query DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::Event;

/// Query parameters for `GET /history/groups`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GroupHistoryParams {
    /// Comma-separated group names.
    #[serde(default)]
    pub groups: Option<String>,
    /// Maximum number of events to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Response body of every history query, newest event first.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Matching events.
    pub data: Vec<Event>,
    /// Number of events in `data`.
    pub count: usize,
}

impl HistoryResponse {
    /// Wraps query results.
    #[must_use]
    pub fn new(data: Vec<Event>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}
