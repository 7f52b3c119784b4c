//! Recording [`Transport`] double with per-call failure injection.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{OutboundMessage, Transport};
use crate::domain::ConnectionId;
use crate::error::HubError;

#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    delivered: Mutex<Vec<(ConnectionId, OutboundMessage)>>,
    joined: Mutex<HashMap<ConnectionId, BTreeSet<String>>>,
    failing_recipients: Mutex<HashSet<ConnectionId>>,
    failing_joins: Mutex<HashSet<String>>,
    failing_leaves: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn fail_deliveries_to(&self, connection_id: &ConnectionId) {
        self.failing_recipients
            .lock()
            .await
            .insert(connection_id.clone());
    }

    pub(crate) async fn fail_joins_for(&self, group: &str) {
        self.failing_joins.lock().await.insert(group.to_string());
    }

    pub(crate) async fn fail_leaves_for(&self, group: &str) {
        self.failing_leaves.lock().await.insert(group.to_string());
    }

    pub(crate) async fn heal(&self) {
        self.failing_recipients.lock().await.clear();
        self.failing_joins.lock().await.clear();
        self.failing_leaves.lock().await.clear();
    }

    pub(crate) async fn deliveries_to(&self, connection_id: &ConnectionId) -> Vec<OutboundMessage> {
        self.delivered
            .lock()
            .await
            .iter()
            .filter(|(to, _)| to == connection_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub(crate) async fn delivery_count(&self) -> usize {
        self.delivered.lock().await.len()
    }

    pub(crate) async fn transport_groups(&self, connection_id: &ConnectionId) -> BTreeSet<String> {
        self.joined
            .lock()
            .await
            .get(connection_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn join_group(&self, connection_id: &ConnectionId, group: &str) -> Result<(), HubError> {
        if self.failing_joins.lock().await.contains(group) {
            return Err(HubError::Internal(format!("join {group} refused")));
        }
        self.joined
            .lock()
            .await
            .entry(connection_id.clone())
            .or_default()
            .insert(group.to_string());
        Ok(())
    }

    async fn leave_group(&self, connection_id: &ConnectionId, group: &str) -> Result<(), HubError> {
        if self.failing_leaves.lock().await.contains(group) {
            return Err(HubError::Internal(format!("leave {group} refused")));
        }
        if let Some(groups) = self.joined.lock().await.get_mut(connection_id) {
            groups.remove(group);
        }
        Ok(())
    }

    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        message: OutboundMessage,
    ) -> Result<(), HubError> {
        if self.failing_recipients.lock().await.contains(connection_id) {
            return Err(HubError::Delivery {
                connection_id: connection_id.clone(),
                reason: "injected failure".to_string(),
            });
        }
        self.delivered
            .lock()
            .await
            .push((connection_id.clone(), message));
        Ok(())
    }

    async fn joined_groups(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<BTreeSet<String>, HubError> {
        Ok(self.transport_groups(connection_id).await)
    }
}
