//! Published events and their per-recipient projection.
//!
//! An [`Event`] is built once by the publisher and then shared as
//! `Arc<Event>` between the history store and the dispatcher; nothing
//! mutates it after that. A [`Notification`] is derived per recipient at
//! delivery time and never stored.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ConnectionId, normalize_groups};

/// Immutable record of something a publisher wants fanned out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Event {
    id: Uuid,
    #[serde(rename = "type")]
    event_type: String,
    data: String,
    timestamp: DateTime<Utc>,
    persist: bool,
    target_groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

impl Event {
    /// Creates a persisted event with no target groups and no publisher.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            data: data.into(),
            timestamp: Utc::now(),
            persist: true,
            target_groups: Vec::new(),
            user_id: None,
            role: None,
        }
    }

    /// Sets the groups this event is addressed to. Names are trimmed;
    /// blanks and repeats are dropped.
    #[must_use]
    pub fn with_target_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw: Vec<String> = groups.into_iter().map(Into::into).collect();
        self.target_groups = normalize_groups(&raw);
        self
    }

    /// Sets whether the event is retained in history.
    #[must_use]
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Records the identity that published the event.
    #[must_use]
    pub fn published_by(mut self, user_id: impl Into<String>, role: Option<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.role = role.filter(|r| !r.is_empty());
        self
    }

    /// Event identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Application-defined type tag.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Opaque payload.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether the event is retained in history.
    #[must_use]
    pub const fn persist(&self) -> bool {
        self.persist
    }

    /// Groups the event is addressed to, normalized.
    #[must_use]
    pub fn target_groups(&self) -> &[String] {
        &self.target_groups
    }

    /// User that published the event, if known.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Role of the publishing user, if known.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Returns `true` if any target group is in `groups`.
    #[must_use]
    pub fn targets_any(&self, groups: &HashSet<&str>) -> bool {
        self.target_groups
            .iter()
            .any(|g| groups.contains(g.as_str()))
    }
}

/// Per-recipient projection of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Notification {
    /// Notification identifier, unique per delivery.
    pub id: Uuid,
    /// Event this notification was derived from.
    pub event_id: Uuid,
    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: String,
    /// Connection the notification is addressed to.
    pub recipient: ConnectionId,
    /// Delivery timestamp.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Projects `event` onto one recipient, stamped with the current time.
    #[must_use]
    pub fn for_recipient(event: &Event, recipient: ConnectionId) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id: event.id(),
            event_type: event.event_type().to_string(),
            data: event.data().to_string(),
            recipient,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_event_defaults_to_persisted_without_groups() {
        let event = Event::new("order.created", "{}");
        assert!(event.persist());
        assert!(event.target_groups().is_empty());
        assert!(event.user_id().is_none());
    }

    #[test]
    fn empty_role_is_dropped() {
        let event = Event::new("t", "d").published_by("alice", Some(String::new()));
        assert_eq!(event.user_id(), Some("alice"));
        assert!(event.role().is_none());
    }

    #[test]
    fn targets_any_checks_intersection() {
        let event = Event::new("t", "d").with_target_groups(["x", "y"]);
        let hit: HashSet<&str> = ["y", "z"].into_iter().collect();
        let miss: HashSet<&str> = ["z"].into_iter().collect();
        assert!(event.targets_any(&hit));
        assert!(!event.targets_any(&miss));
    }

    #[test]
    fn target_groups_are_normalized() {
        let event = Event::new("t", "d").with_target_groups([" y", "y", "", "x "]);
        assert_eq!(event.target_groups(), ["y".to_string(), "x".to_string()]);
        let wanted: HashSet<&str> = ["y"].into_iter().collect();
        assert!(event.targets_any(&wanted));
    }

    #[test]
    fn event_serializes_type_field() {
        let event = Event::new("order.created", "payload").with_persist(false);
        let Ok(json) = serde_json::to_value(&event) else {
            panic!("serialization failed");
        };
        assert_eq!(
            json.get("type").and_then(|v| v.as_str()),
            Some("order.created")
        );
        assert_eq!(json.get("persist").and_then(|v| v.as_bool()), Some(false));
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn notification_copies_event_fields() {
        let event = Event::new("t", "d");
        let recipient = ConnectionId::from_raw("c1");
        let n = Notification::for_recipient(&event, recipient.clone());
        assert_eq!(n.event_id, event.id());
        assert_eq!(n.event_type, "t");
        assert_eq!(n.data, "d");
        assert_eq!(n.recipient, recipient);
        assert_ne!(n.id, event.id());
    }
}
