//! Data Transfer Objects for REST request/response serialization.
//!
//! Request bodies implement [`Validate`]; handlers call it before touching
//! the service layer, so invalid input never reaches the dispatcher.

pub mod common_dto;
pub mod event_dto;
pub mod group_dto;
pub mod history_dto;

pub use common_dto::*;
pub use event_dto::*;
pub use group_dto::*;
pub use history_dto::*;

use crate::error::HubError;

/// Structural validation of an incoming request.
pub trait Validate {
    /// Checks the request.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidRequest`] naming the first offending field.
    fn validate(&self) -> Result<(), HubError>;
}
