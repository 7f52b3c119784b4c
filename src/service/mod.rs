//! Service layer: publish fan-out and connection lifecycle orchestration.
//!
//! [`Dispatcher`] turns one published event into per-connection deliveries.
//! [`ConnectionLifecycle`] keeps registry membership and transport routing
//! in step as connections come and go.

pub mod dispatcher;
pub mod lifecycle;

pub use dispatcher::{Dispatcher, PublishOutcome};
pub use lifecycle::{ConnectionLifecycle, MembershipChange};

pub use crate::domain::normalize_groups;

/// Splits a comma-separated group list such as `"a, b,,c"`.
#[must_use]
pub fn parse_group_list(raw: &str) -> Vec<String> {
    normalize_groups(&raw.split(',').collect::<Vec<_>>())
}
