//! Connection lifecycle: connect, disconnect, subscribe, unsubscribe.
//!
//! Every membership change is applied to the [`GroupRegistry`] first and
//! then mirrored on the [`Transport`]. When the two disagree afterwards:
//!
//! - a refused join is rolled back out of the registry, so the connection
//!   is never registered for a group it cannot be routed in;
//! - a refused leave marks the connection, and its next subscribe or
//!   unsubscribe first reconciles transport routing against the registry.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use utoipa::ToSchema;

use super::normalize_groups;
use crate::domain::{
    ConnectionEntry, ConnectionId, GroupRegistry, HistoryStore, NotificationPreferences,
    PreferenceStore,
};
use crate::error::HubError;
use crate::transport::{OutboundMessage, Transport};

/// Result of a membership change on one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct MembershipChange {
    /// Groups joined or left by this call.
    pub groups: Vec<String>,
    /// Groups the transport refused to join; they were not kept.
    pub rejected: Vec<String>,
    /// Number of history events replayed to the connection.
    pub replayed: usize,
}

/// Translates connection events into registry and transport updates.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    registry: Arc<GroupRegistry>,
    history: Arc<HistoryStore>,
    preferences: Arc<PreferenceStore>,
    transport: Arc<dyn Transport>,
    replay_limit: Option<usize>,
    needs_reconcile: Mutex<HashSet<ConnectionId>>,
}

impl ConnectionLifecycle {
    /// Creates a new `ConnectionLifecycle`. `replay_limit` caps the history
    /// replay batch; `None` uses the history store's default limit.
    #[must_use]
    pub fn new(
        registry: Arc<GroupRegistry>,
        history: Arc<HistoryStore>,
        preferences: Arc<PreferenceStore>,
        transport: Arc<dyn Transport>,
        replay_limit: Option<usize>,
    ) -> Self {
        Self {
            registry,
            history,
            preferences,
            transport,
            replay_limit,
            needs_reconcile: Mutex::new(HashSet::new()),
        }
    }

    /// Registers a new connection in `groups` and replays recent history
    /// for those groups as one batch.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] if `user_id` is empty.
    pub async fn on_connect(
        &self,
        connection_id: &ConnectionId,
        user_id: &str,
        groups: &[String],
    ) -> Result<MembershipChange, HubError> {
        require_identity(user_id)?;
        let groups = normalize_groups(groups);
        tracing::info!(%connection_id, user_id, groups = ?groups, "user connected");

        let mut change = self.join(connection_id, user_id, &groups).await;
        let held = self.held_groups(connection_id, user_id).await;
        let replay_groups: Vec<String> = groups.into_iter().filter(|g| held.contains(g)).collect();
        change.replayed = self.replay(connection_id, user_id, &replay_groups).await;
        Ok(change)
    }

    /// Removes every trace of the connection from the registry. The
    /// transport session is assumed to be gone already.
    pub async fn on_disconnect(
        &self,
        connection_id: &ConnectionId,
        user_id: &str,
    ) -> Option<ConnectionEntry> {
        tracing::info!(%connection_id, user_id, "user disconnected");
        self.needs_reconcile.lock().await.remove(connection_id);
        self.registry.remove_connection(connection_id).await
    }

    /// Adds groups to a live connection and replays history for the groups
    /// that were newly joined.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] if `user_id` is empty.
    pub async fn subscribe_more(
        &self,
        connection_id: &ConnectionId,
        user_id: &str,
        groups: &[String],
    ) -> Result<MembershipChange, HubError> {
        require_identity(user_id)?;
        self.reconcile_if_flagged(connection_id).await;
        let groups = normalize_groups(groups);

        let mut change = self.join(connection_id, user_id, &groups).await;
        change.replayed = self.replay(connection_id, user_id, &change.groups).await;
        Ok(change)
    }

    /// Removes groups from a live connection.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] if `user_id` is empty.
    pub async fn unsubscribe(
        &self,
        connection_id: &ConnectionId,
        user_id: &str,
        groups: &[String],
    ) -> Result<MembershipChange, HubError> {
        require_identity(user_id)?;
        self.reconcile_if_flagged(connection_id).await;
        let groups = normalize_groups(groups);
        tracing::info!(%connection_id, user_id, groups = ?groups, "user unsubscribing from groups");

        let removed = self.registry.unsubscribe(user_id, connection_id, &groups).await;
        let mut diverged = false;
        for group in &removed {
            if let Err(e) = self.transport.leave_group(connection_id, group).await {
                tracing::warn!(%connection_id, group = %group, error = %e, "transport leave failed");
                diverged = true;
            }
        }
        if diverged {
            self.needs_reconcile
                .lock()
                .await
                .insert(connection_id.clone());
        }

        Ok(MembershipChange {
            groups: removed,
            ..MembershipChange::default()
        })
    }

    /// Stores the notification preferences of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] if `user_id` is empty.
    pub async fn configure_notifications(
        &self,
        user_id: &str,
        preferences: NotificationPreferences,
    ) -> Result<(), HubError> {
        require_identity(user_id)?;
        tracing::info!(user_id, "user configuring notifications");
        self.preferences.set(user_id, preferences).await;
        Ok(())
    }

    /// Converges transport routing of `connection_id` on its registry
    /// membership. Returns `true` once both agree.
    pub async fn reconcile(&self, connection_id: &ConnectionId) -> bool {
        let wanted = self.registry.groups_of(connection_id).await;
        let actual = match self.transport.joined_groups(connection_id).await {
            Ok(groups) => groups,
            Err(e) => {
                tracing::warn!(%connection_id, error = %e, "cannot read transport groups");
                return false;
            }
        };

        let mut converged = true;
        for group in wanted.difference(&actual) {
            if let Err(e) = self.transport.join_group(connection_id, group).await {
                tracing::warn!(%connection_id, group = %group, error = %e, "reconcile join failed");
                converged = false;
            }
        }
        for group in actual.difference(&wanted) {
            if let Err(e) = self.transport.leave_group(connection_id, group).await {
                tracing::warn!(%connection_id, group = %group, error = %e, "reconcile leave failed");
                converged = false;
            }
        }

        let mut flagged = self.needs_reconcile.lock().await;
        if converged {
            flagged.remove(connection_id);
        } else {
            flagged.insert(connection_id.clone());
        }
        converged
    }

    async fn reconcile_if_flagged(&self, connection_id: &ConnectionId) {
        let flagged = self.needs_reconcile.lock().await.contains(connection_id);
        if flagged && self.reconcile(connection_id).await {
            tracing::info!(%connection_id, "transport routing reconciled");
        }
    }

    /// Groups `connection_id` holds on behalf of `user_id`; empty when the
    /// connection is unknown or owned by someone else.
    async fn held_groups(&self, connection_id: &ConnectionId, user_id: &str) -> BTreeSet<String> {
        match self.registry.connection(connection_id).await {
            Some(entry) if entry.user_id == user_id => entry.groups,
            _ => BTreeSet::new(),
        }
    }

    /// Registry subscribe, then transport join per newly added group, with
    /// rollback of every group the transport refused. A registry entry
    /// created by this call that ends up holding no group is removed again.
    async fn join(
        &self,
        connection_id: &ConnectionId,
        user_id: &str,
        groups: &[String],
    ) -> MembershipChange {
        let existed = self.registry.connection(connection_id).await.is_some();
        let added = self.registry.subscribe(user_id, connection_id, groups).await;

        let mut change = MembershipChange::default();
        for group in added {
            match self.transport.join_group(connection_id, &group).await {
                Ok(()) => change.groups.push(group),
                Err(e) => {
                    tracing::warn!(%connection_id, group = %group, error = %e, "transport join failed, rolling back");
                    change.rejected.push(group);
                }
            }
        }
        if !change.rejected.is_empty() {
            let _ = self
                .registry
                .unsubscribe(user_id, connection_id, &change.rejected)
                .await;
        }
        if !existed && self.registry.groups_of(connection_id).await.is_empty() {
            let _ = self.registry.remove_connection(connection_id).await;
        }
        change
    }

    async fn replay(&self, connection_id: &ConnectionId, user_id: &str, groups: &[String]) -> usize {
        let events = self.history.query_by_groups(groups, self.replay_limit).await;
        if events.is_empty() {
            return 0;
        }
        let count = events.len();
        match self
            .transport
            .deliver(connection_id, OutboundMessage::History(events))
            .await
        {
            Ok(()) => {
                tracing::info!(%connection_id, user_id, count, "sent historical events to user");
                count
            }
            Err(e) => {
                tracing::warn!(%connection_id, user_id, error = %e, "history replay failed");
                0
            }
        }
    }
}

fn require_identity(user_id: &str) -> Result<(), HubError> {
    if user_id.is_empty() {
        return Err(HubError::Unauthorized("user not authenticated".to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Event;
    use crate::transport::ConnectionHub;
    use crate::transport::testing::RecordingTransport;

    struct Fixture {
        registry: Arc<GroupRegistry>,
        history: Arc<HistoryStore>,
        preferences: Arc<PreferenceStore>,
        transport: Arc<RecordingTransport>,
        lifecycle: ConnectionLifecycle,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(GroupRegistry::new());
        let history = Arc::new(HistoryStore::default());
        let preferences = Arc::new(PreferenceStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let lifecycle = ConnectionLifecycle::new(
            Arc::clone(&registry),
            Arc::clone(&history),
            Arc::clone(&preferences),
            Arc::clone(&transport) as Arc<dyn Transport>,
            None,
        );
        Fixture {
            registry,
            history,
            preferences,
            transport,
            lifecycle,
        }
    }

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    async fn seed(history: &HistoryStore, event_type: &str, targets: &[&str]) {
        let event = Event::new(event_type, "d").with_target_groups(targets.iter().copied());
        let Ok(()) = history.append(Arc::new(event)).await else {
            panic!("append failed");
        };
    }

    async fn history_batches(transport: &RecordingTransport, conn: &ConnectionId) -> Vec<Vec<String>> {
        transport
            .deliveries_to(conn)
            .await
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::History(events) => Some(
                    events
                        .iter()
                        .map(|e| e.event_type().to_string())
                        .collect::<Vec<_>>(),
                ),
                OutboundMessage::Notification(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn connect_replays_group_history_newest_first() {
        let f = fixture();
        seed(&f.history, "z1", &["z"]).await;
        seed(&f.history, "other", &["w"]).await;
        seed(&f.history, "z2", &["z"]).await;
        seed(&f.history, "z3", &["z", "w"]).await;

        let conn = ConnectionId::from_raw("c1");
        let Ok(change) = f.lifecycle.on_connect(&conn, "alice", &groups(&["z"])).await else {
            panic!("connect failed");
        };

        assert_eq!(change.groups, groups(&["z"]));
        assert_eq!(change.replayed, 3);
        let batches = history_batches(&f.transport, &conn).await;
        assert_eq!(batches, vec![vec!["z3", "z2", "z1"]]);
        assert_eq!(f.transport.transport_groups(&conn).await.len(), 1);
    }

    #[tokio::test]
    async fn connect_without_history_sends_nothing() {
        let f = fixture();
        let conn = ConnectionId::from_raw("c1");
        let Ok(change) = f.lifecycle.on_connect(&conn, "alice", &groups(&["z"])).await else {
            panic!("connect failed");
        };
        assert_eq!(change.replayed, 0);
        assert_eq!(f.transport.delivery_count().await, 0);
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let f = fixture();
        let conn = ConnectionId::from_raw("c1");
        let Err(HubError::Unauthorized(_)) = f.lifecycle.on_connect(&conn, "", &groups(&["z"])).await
        else {
            panic!("expected Unauthorized");
        };
        assert!(f.lifecycle.subscribe_more(&conn, "", &groups(&["z"])).await.is_err());
        assert!(f.lifecycle.unsubscribe(&conn, "", &groups(&["z"])).await.is_err());
        assert!(
            f.lifecycle
                .configure_notifications("", NotificationPreferences::default())
                .await
                .is_err()
        );
        assert_eq!(f.registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn disconnect_clears_membership() {
        let f = fixture();
        let conn = ConnectionId::from_raw("c1");
        let _ = f.lifecycle.on_connect(&conn, "alice", &groups(&["x", "y"])).await;

        let Some(entry) = f.lifecycle.on_disconnect(&conn, "alice").await else {
            panic!("connection should be registered");
        };
        assert_eq!(entry.groups.len(), 2);
        assert!(f.registry.all_groups().await.is_empty());
        assert!(f.registry.groups_of(&conn).await.is_empty());
    }

    #[tokio::test]
    async fn subscribe_more_joins_and_replays_only_new_groups() {
        let f = fixture();
        seed(&f.history, "x1", &["x"]).await;
        seed(&f.history, "y1", &["y"]).await;
        let conn = ConnectionId::from_raw("c1");
        let _ = f.lifecycle.on_connect(&conn, "alice", &groups(&["x"])).await;

        let Ok(change) = f
            .lifecycle
            .subscribe_more(&conn, "alice", &groups(&["x", "y"]))
            .await
        else {
            panic!("subscribe failed");
        };
        assert_eq!(change.groups, groups(&["y"]));
        assert_eq!(change.replayed, 1);
        assert_eq!(
            history_batches(&f.transport, &conn).await,
            vec![vec!["x1"], vec!["y1"]]
        );
        assert_eq!(f.transport.transport_groups(&conn).await.len(), 2);
    }

    #[tokio::test]
    async fn unsubscribe_leaves_registry_and_transport() {
        let f = fixture();
        let conn = ConnectionId::from_raw("c1");
        let _ = f.lifecycle.on_connect(&conn, "alice", &groups(&["x", "y"])).await;

        let Ok(change) = f.lifecycle.unsubscribe(&conn, "alice", &groups(&["y", "q"])).await else {
            panic!("unsubscribe failed");
        };
        assert_eq!(change.groups, groups(&["y"]));
        assert_eq!(
            f.registry.groups_of(&conn).await,
            f.transport.transport_groups(&conn).await
        );
    }

    #[tokio::test]
    async fn refused_join_is_rolled_back() {
        let f = fixture();
        f.transport.fail_joins_for("secret").await;
        let conn = ConnectionId::from_raw("c1");

        let Ok(change) = f
            .lifecycle
            .on_connect(&conn, "alice", &groups(&["x", "secret"]))
            .await
        else {
            panic!("connect failed");
        };
        assert_eq!(change.groups, groups(&["x"]));
        assert_eq!(change.rejected, groups(&["secret"]));
        assert!(f.registry.group_members("secret").await.is_empty());
        assert_eq!(
            f.registry.groups_of(&conn).await,
            f.transport.transport_groups(&conn).await
        );
    }

    #[tokio::test]
    async fn refused_leave_is_reconciled_on_next_activity() {
        let f = fixture();
        let conn = ConnectionId::from_raw("c1");
        let _ = f.lifecycle.on_connect(&conn, "alice", &groups(&["x", "y"])).await;
        f.transport.fail_leaves_for("y").await;

        let _ = f.lifecycle.unsubscribe(&conn, "alice", &groups(&["y"])).await;
        assert!(!f.registry.groups_of(&conn).await.contains("y"));
        assert!(f.transport.transport_groups(&conn).await.contains("y"));
        assert!(f.lifecycle.needs_reconcile.lock().await.contains(&conn));

        f.transport.heal().await;
        let _ = f.lifecycle.subscribe_more(&conn, "alice", &groups(&["z"])).await;
        assert_eq!(
            f.registry.groups_of(&conn).await,
            f.transport.transport_groups(&conn).await
        );
        assert!(!f.lifecycle.needs_reconcile.lock().await.contains(&conn));
    }

    #[tokio::test]
    async fn connect_by_another_user_replays_nothing() {
        let f = fixture();
        let conn = ConnectionId::from_raw("c1");
        let _ = f.lifecycle.on_connect(&conn, "alice", &groups(&["x"])).await;
        seed(&f.history, "x1", &["x"]).await;
        seed(&f.history, "z1", &["z"]).await;

        let Ok(change) = f
            .lifecycle
            .on_connect(&conn, "mallory", &groups(&["z", "x"]))
            .await
        else {
            panic!("connect failed");
        };
        assert!(change.groups.is_empty());
        assert_eq!(change.replayed, 0);
        assert!(history_batches(&f.transport, &conn).await.is_empty());
        assert_eq!(f.registry.groups_of(&conn).await, BTreeSet::from(["x".to_string()]));
    }

    #[tokio::test]
    async fn join_without_transport_session_leaves_no_entry() {
        let registry = Arc::new(GroupRegistry::new());
        let hub = Arc::new(ConnectionHub::default());
        let lifecycle = ConnectionLifecycle::new(
            Arc::clone(&registry),
            Arc::new(HistoryStore::default()),
            Arc::new(PreferenceStore::new()),
            Arc::clone(&hub) as Arc<dyn Transport>,
            None,
        );
        let ghost = ConnectionId::from_raw("ghost");

        let Ok(change) = lifecycle.subscribe_more(&ghost, "alice", &groups(&["x"])).await else {
            panic!("subscribe failed");
        };
        assert!(change.groups.is_empty());
        assert_eq!(change.rejected, groups(&["x"]));
        assert_eq!(registry.connection_count().await, 0);
        assert!(registry.connection(&ghost).await.is_none());
        assert!(registry.all_groups().await.is_empty());

        let Ok(change) = lifecycle.on_connect(&ghost, "alice", &groups(&["y"])).await else {
            panic!("connect failed");
        };
        assert_eq!(change.rejected, groups(&["y"]));
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn partial_rollback_keeps_existing_entry() {
        let f = fixture();
        let conn = ConnectionId::from_raw("c1");
        let _ = f.lifecycle.on_connect(&conn, "alice", &groups(&["x"])).await;
        f.transport.fail_joins_for("y").await;

        let _ = f.lifecycle.subscribe_more(&conn, "alice", &groups(&["y"])).await;
        let Some(entry) = f.registry.connection(&conn).await else {
            panic!("entry should survive a refused join");
        };
        assert_eq!(entry.user_id, "alice");
        assert_eq!(entry.groups, BTreeSet::from(["x".to_string()]));
    }

    #[tokio::test]
    async fn configure_notifications_stores_preferences() {
        let f = fixture();
        let prefs = NotificationPreferences {
            event_types: vec!["a".to_string()],
            ..NotificationPreferences::default()
        };
        let Ok(()) = f.lifecycle.configure_notifications("alice", prefs.clone()).await else {
            panic!("configure failed");
        };
        assert_eq!(f.preferences.get("alice").await, Some(prefs));
    }
}
