//! Per-user notification preferences.
//!
//! A user may narrow what reaches their connections by event type and by
//! one payload field. Preferences are keyed by user, so they apply to every
//! connection the user opens, and live for the lifetime of the process.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::Event;

/// Delivery filter configured by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationPreferences {
    /// Event types to receive. Empty means all types.
    #[serde(default)]
    pub event_types: Vec<String>,
    /// Top-level payload field to compare, if any.
    #[serde(default)]
    pub filter_field: Option<String>,
    /// Value `filter_field` must equal.
    #[serde(default)]
    pub filter_value: Option<String>,
}

impl NotificationPreferences {
    /// Returns `true` if `event` should be delivered under these settings.
    ///
    /// The field filter only applies when both `filter_field` and
    /// `filter_value` are set; the payload must then be a JSON object whose
    /// field, rendered as a string, equals `filter_value`.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if !self.event_types.is_empty()
            && !self.event_types.iter().any(|t| t == event.event_type())
        {
            return false;
        }
        let (Some(field), Some(expected)) = (&self.filter_field, &self.filter_value) else {
            return true;
        };
        let Ok(payload) = serde_json::from_str::<serde_json::Value>(event.data()) else {
            return false;
        };
        match payload.get(field) {
            Some(serde_json::Value::String(s)) => s == expected,
            Some(serde_json::Value::Null) | None => false,
            Some(other) => other.to_string() == *expected,
        }
    }

    /// Returns `true` if these settings let every event through.
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        self.event_types.is_empty() && (self.filter_field.is_none() || self.filter_value.is_none())
    }
}

/// Concurrent map of user id to [`NotificationPreferences`].
#[derive(Debug, Default)]
pub struct PreferenceStore {
    by_user: RwLock<HashMap<String, NotificationPreferences>>,
}

impl PreferenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the preferences of `user_id`. Pass-through settings remove
    /// the entry.
    pub async fn set(&self, user_id: &str, preferences: NotificationPreferences) {
        let mut map = self.by_user.write().await;
        if preferences.is_pass_through() {
            map.remove(user_id);
        } else {
            map.insert(user_id.to_string(), preferences);
        }
    }

    /// Preferences of `user_id`, if any were stored.
    pub async fn get(&self, user_id: &str) -> Option<NotificationPreferences> {
        self.by_user.read().await.get(user_id).cloned()
    }

    /// Snapshot of the preferences of the given users, skipping those
    /// without any.
    pub async fn for_users<'a, I>(&self, user_ids: I) -> HashMap<String, NotificationPreferences>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let map = self.by_user.read().await;
        user_ids
            .into_iter()
            .filter_map(|u| map.get(u).map(|p| (u.to_string(), p.clone())))
            .collect()
    }
}
