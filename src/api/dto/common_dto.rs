//! Shared DTO types used across multiple endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

/// Result size query parameter for history endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitParams {
    /// Maximum number of events to return. Defaults to the configured
    /// history limit; capped at the configured maximum.
    #[serde(default)]
    pub limit: Option<usize>,
}
