//! Transport layer: the capability the core uses to reach connections.
//!
//! The dispatcher and lifecycle handler only talk to [`Transport`]. The
//! in-process WebSocket implementation is [`ConnectionHub`]; tests swap in
//! a recording double.

pub mod hub;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ConnectionId, Event, Notification};
use crate::error::HubError;

pub use hub::ConnectionHub;

/// A message pushed from the server to one connection.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Live fan-out of one event.
    Notification(Notification),
    /// Replay of recent events, newest first.
    History(Vec<Arc<Event>>),
}

impl OutboundMessage {
    /// Short label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Notification(_) => "notification",
            Self::History(_) => "history",
        }
    }
}

/// Delivery and transport-level group routing for live connections.
///
/// Every call is best-effort and may fail independently. Implementations
/// must not block on a slow client.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Adds the connection to a transport-level group.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ConnectionNotFound`] if the connection has no
    /// live session.
    async fn join_group(&self, connection_id: &ConnectionId, group: &str) -> Result<(), HubError>;

    /// Removes the connection from a transport-level group.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ConnectionNotFound`] if the connection has no
    /// live session.
    async fn leave_group(&self, connection_id: &ConnectionId, group: &str) -> Result<(), HubError>;

    /// Hands one message to the connection without waiting for the client.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Delivery`] or [`HubError::ConnectionNotFound`]
    /// when the message cannot be queued.
    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        message: OutboundMessage,
    ) -> Result<(), HubError>;

    /// Transport-level groups the connection currently belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ConnectionNotFound`] if the connection has no
    /// live session.
    async fn joined_groups(&self, connection_id: &ConnectionId)
    -> Result<BTreeSet<String>, HubError>;
}
