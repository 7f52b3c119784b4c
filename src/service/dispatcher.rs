//! Publish fan-out: history write, membership resolution, delivery.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Event, GroupRegistry, HistoryStore, Notification, PreferenceStore, Recipient};
use crate::transport::{OutboundMessage, Transport};

/// Summary of one publish, returned once every delivery was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublishOutcome {
    /// Identifier of the published event.
    pub event_id: Uuid,
    /// Whether the event is now in history.
    pub persisted: bool,
    /// Groups the event was fanned out to.
    pub target_groups: Vec<String>,
    /// Distinct connections that were members of a target group.
    pub recipients: usize,
    /// Deliveries the transport accepted.
    pub delivered: usize,
    /// Recipients skipped by their owner's notification preferences.
    pub filtered: usize,
    /// Deliveries the transport rejected.
    pub failed: usize,
}

/// Orchestrates a publish.
///
/// Follows the pattern: persist (if requested) → snapshot membership →
/// release every lock → deliver to each recipient independently.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<GroupRegistry>,
    history: Arc<HistoryStore>,
    preferences: Arc<PreferenceStore>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    /// Creates a new `Dispatcher`.
    #[must_use]
    pub fn new(
        registry: Arc<GroupRegistry>,
        history: Arc<HistoryStore>,
        preferences: Arc<PreferenceStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry,
            history,
            preferences,
            transport,
        }
    }

    /// Publishes `event` to the current members of its target groups.
    ///
    /// An event without target groups is accepted (and persisted if
    /// requested) but reaches nobody. A history write failure is logged and
    /// reported through [`PublishOutcome::persisted`]; fan-out still runs.
    /// A delivery failure for one connection never stops the others.
    pub async fn publish(&self, event: Event) -> PublishOutcome {
        let event = Arc::new(event);
        let target_groups = event.target_groups().to_vec();
        tracing::info!(
            event_id = %event.id(),
            event_type = event.event_type(),
            groups = ?target_groups,
            persist = event.persist(),
            "processing event"
        );

        let persisted = if event.persist() {
            match self.history.append(Arc::clone(&event)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(event_id = %event.id(), error = %e, "failed to save event to history");
                    false
                }
            }
        } else {
            false
        };

        let mut outcome = PublishOutcome {
            event_id: event.id(),
            persisted,
            target_groups,
            recipients: 0,
            delivered: 0,
            filtered: 0,
            failed: 0,
        };

        if outcome.target_groups.is_empty() {
            tracing::info!(event_id = %event.id(), "event has no target groups, not fanned out");
            return outcome;
        }

        let recipients = self.registry.members_of_groups(&outcome.target_groups).await;
        outcome.recipients = recipients.len();

        let preferences = self
            .preferences
            .for_users(recipients.iter().map(|r| r.user_id.as_str()))
            .await;
        let (allowed, skipped): (Vec<Recipient>, Vec<Recipient>) =
            recipients.into_iter().partition(|r| {
                preferences
                    .get(&r.user_id)
                    .is_none_or(|p| p.matches(&event))
            });
        outcome.filtered = skipped.len();

        let transport = &self.transport;
        let deliveries = allowed.iter().map(|recipient| {
            let notification = Notification::for_recipient(&event, recipient.connection_id.clone());
            async move {
                let result = transport
                    .deliver(
                        &recipient.connection_id,
                        OutboundMessage::Notification(notification),
                    )
                    .await;
                (recipient, result)
            }
        });

        for (recipient, result) in join_all(deliveries).await {
            match result {
                Ok(()) => {
                    outcome.delivered = outcome.delivered.saturating_add(1);
                    tracing::debug!(
                        connection_id = %recipient.connection_id,
                        event_id = %event.id(),
                        "notification delivered"
                    );
                }
                Err(e) => {
                    outcome.failed = outcome.failed.saturating_add(1);
                    tracing::warn!(
                        connection_id = %recipient.connection_id,
                        user_id = %recipient.user_id,
                        event_id = %event.id(),
                        error = %e,
                        "notification delivery failed"
                    );
                }
            }
        }

        tracing::info!(
            event_id = %event.id(),
            event_type = event.event_type(),
            recipients = outcome.recipients,
            delivered = outcome.delivered,
            filtered = outcome.filtered,
            failed = outcome.failed,
            "notification sent to groups"
        );
        outcome
    }
}
