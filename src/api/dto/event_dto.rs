//! Event ingestion DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use super::Validate;
use crate::auth::Identity;
use crate::domain::Event;
use crate::error::HubError;

/// Longest accepted event type.
pub const MAX_EVENT_TYPE_LEN: usize = 200;

/// Request body for `POST /events`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PublishEventRequest {
    /// Application-defined event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload. A JSON string is stored as-is; any other JSON value is
    /// stored in its serialized form.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Whether the event is written to history. Defaults to `true`.
    #[serde(default = "default_persist", alias = "save_to_history")]
    pub persist: bool,
    /// Groups to deliver to. Empty stores the event without delivering it.
    #[serde(default)]
    pub target_groups: Vec<String>,
}

fn default_persist() -> bool {
    true
}

impl PublishEventRequest {
    /// Payload as stored on the [`Event`].
    #[must_use]
    pub fn data_text(&self) -> String {
        match &self.data {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Builds the domain event, stamped with the publisher's identity.
    #[must_use]
    pub fn into_event(self, publisher: &Identity) -> Event {
        let data = self.data_text();
        Event::new(self.event_type.trim(), data)
            .with_persist(self.persist)
            .with_target_groups(self.target_groups)
            .published_by(publisher.user_id.clone(), publisher.role.clone())
    }
}

impl Validate for PublishEventRequest {
    fn validate(&self) -> Result<(), HubError> {
        let event_type = self.event_type.trim();
        if event_type.is_empty() {
            return Err(HubError::InvalidRequest(
                "event type must not be empty".to_string(),
            ));
        }
        if event_type.len() > MAX_EVENT_TYPE_LEN {
            return Err(HubError::InvalidRequest(format!(
                "event type exceeds {MAX_EVENT_TYPE_LEN} characters"
            )));
        }
        if self.data_text().is_empty() {
            return Err(HubError::InvalidRequest(
                "event data must not be empty".to_string(),
            ));
        }
        if self.target_groups.iter().any(|g| g.trim().is_empty()) {
            return Err(HubError::InvalidRequest(
                "target group names must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
