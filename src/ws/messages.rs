//! WebSocket message types: envelope, commands, and server pushes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Event, NotificationPreferences};
use crate::transport::OutboundMessage;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for pushes.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server message stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error message carrying `code` and `message`.
    #[must_use]
    pub fn error(id: impl Into<String>, code: u32, message: impl Into<String>) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({
                "code": code,
                "message": message.into(),
            }),
        )
    }

    /// Renders an outbound hub message as the envelope pushed to the client.
    ///
    /// Returns `None` only if the payload cannot be serialized.
    #[must_use]
    pub fn from_outbound(message: &OutboundMessage) -> Option<Self> {
        match message {
            OutboundMessage::Notification(notification) => {
                let payload = serde_json::to_value(notification).ok()?;
                Some(Self::new(
                    notification.id.to_string(),
                    WsMessageType::Notification,
                    payload,
                ))
            }
            OutboundMessage::History(events) => {
                let count = events.len();
                let events: Vec<&Event> = events.iter().map(|e| &**e).collect();
                let payload = serde_json::json!({
                    "events": events,
                    "count": count,
                });
                Some(Self::new(
                    uuid::Uuid::new_v4().to_string(),
                    WsMessageType::History,
                    payload,
                ))
            }
        }
    }

    /// Serializes the envelope to JSON text.
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client notification for one published event.
    Notification,
    /// Server → Client batch of past events.
    History,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket, carried in the
/// envelope payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Join more groups.
    Subscribe {
        /// Groups to join.
        groups: Vec<String>,
    },
    /// Leave groups.
    Unsubscribe {
        /// Groups to leave.
        groups: Vec<String>,
    },
    /// Replace the caller's notification preferences.
    ConfigureNotifications {
        /// Event types to receive; empty receives all.
        #[serde(default)]
        event_types: Vec<String>,
        /// Payload field to filter on.
        #[serde(default)]
        filter_field: Option<String>,
        /// Required value of `filter_field`.
        #[serde(default)]
        filter_value: Option<String>,
    },
}

impl WsCommand {
    /// Command name as sent by the client.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::ConfigureNotifications { .. } => "configure_notifications",
        }
    }

    /// Preferences carried by a `configure_notifications` command.
    #[must_use]
    pub fn into_preferences(self) -> Option<NotificationPreferences> {
        match self {
            Self::ConfigureNotifications {
                event_types,
                filter_field,
                filter_value,
            } => Some(NotificationPreferences {
                event_types,
                filter_field,
                filter_value,
            }),
            Self::Subscribe { .. } | Self::Unsubscribe { .. } => None,
        }
    }
}
