//! Connection/user/group membership registry.
//!
//! [`GroupRegistry`] keeps a forward map (connection → owning user and
//! groups) and a reverse map (group → member connections) behind a single
//! [`tokio::sync::RwLock`]. Every mutation updates both maps inside one
//! write-lock critical section, so a concurrent reader never observes a
//! connection that is in a group's member set without that group being in
//! the connection's own set, or the other way around.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::ConnectionId;

/// Snapshot of one registered connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConnectionEntry {
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// User that opened the connection.
    pub user_id: String,
    /// Groups the connection currently belongs to.
    pub groups: BTreeSet<String>,
    /// When the connection was first registered.
    pub subscribed_at: DateTime<Utc>,
}

/// A connection resolved as the target of a fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Recipient {
    /// Connection to deliver to.
    pub connection_id: ConnectionId,
    /// Owner of the connection.
    pub user_id: String,
}

#[derive(Debug, Default)]
struct Membership {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    groups: HashMap<String, HashSet<ConnectionId>>,
}

impl Membership {
    fn join(&mut self, connection_id: &ConnectionId, group: &str) -> bool {
        let Some(entry) = self.connections.get_mut(connection_id) else {
            return false;
        };
        if !entry.groups.insert(group.to_string()) {
            return false;
        }
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(connection_id.clone());
        true
    }

    fn leave(&mut self, connection_id: &ConnectionId, group: &str) -> bool {
        let Some(entry) = self.connections.get_mut(connection_id) else {
            return false;
        };
        if !entry.groups.remove(group) {
            return false;
        }
        self.detach(connection_id, group);
        true
    }

    /// Drops `connection_id` from the reverse map of `group`, removing the
    /// group entry once it has no members.
    fn detach(&mut self, connection_id: &ConnectionId, group: &str) {
        if let Some(members) = self.groups.get_mut(group) {
            members.remove(connection_id);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
    }

    fn is_consistent(&self) -> bool {
        let forward_ok = self.connections.iter().all(|(id, entry)| {
            entry
                .groups
                .iter()
                .all(|g| self.groups.get(g).is_some_and(|m| m.contains(id)))
        });
        let reverse_ok = self.groups.iter().all(|(group, members)| {
            !members.is_empty()
                && members.iter().all(|id| {
                    self.connections
                        .get(id)
                        .is_some_and(|e| e.groups.contains(group))
                })
        });
        forward_ok && reverse_ok
    }
}

/// Single source of truth for who receives what.
///
/// # Concurrency
///
/// - Reads (`group_members`, `members_of_groups`, ...) share the lock.
/// - Each mutation holds the write lock for its whole multi-key update.
/// - No method awaits anything but the lock, so callers never hold it
///   across I/O.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    state: RwLock<Membership>,
}

impl GroupRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `groups` to the connection's membership, registering the
    /// connection under `user_id` if it is not known yet.
    ///
    /// Re-subscribing to a held group is a no-op for that group. Empty
    /// `user_id` or `connection_id` is ignored. A connection stays owned by
    /// the user that registered it; a call naming another user changes
    /// nothing.
    ///
    /// Returns the groups that were newly added, in input order.
    pub async fn subscribe(
        &self,
        user_id: &str,
        connection_id: &ConnectionId,
        groups: &[String],
    ) -> Vec<String> {
        if user_id.is_empty() || connection_id.is_empty() {
            tracing::debug!("subscribe ignored: empty user or connection id");
            return Vec::new();
        }

        let mut state = self.state.write().await;
        let entry = state
            .connections
            .entry(connection_id.clone())
            .or_insert_with(|| ConnectionEntry {
                connection_id: connection_id.clone(),
                user_id: user_id.to_string(),
                groups: BTreeSet::new(),
                subscribed_at: Utc::now(),
            });
        if entry.user_id != user_id {
            tracing::warn!(
                %connection_id,
                owner = %entry.user_id,
                user_id,
                "subscribe ignored: connection owned by another user"
            );
            return Vec::new();
        }

        let mut added = Vec::new();
        for group in groups.iter().filter(|g| !g.is_empty()) {
            if state.join(connection_id, group) {
                added.push(group.clone());
            }
        }
        debug_assert!(state.is_consistent(), "registry maps diverged after subscribe");
        drop(state);

        if !added.is_empty() {
            tracing::info!(%connection_id, user_id, groups = ?added, "subscribed to groups");
        }
        added
    }

    /// Removes `groups` from the connection's membership.
    ///
    /// Groups the connection does not hold are ignored, as is an unknown
    /// connection. Returns the groups that were actually removed.
    pub async fn unsubscribe(
        &self,
        user_id: &str,
        connection_id: &ConnectionId,
        groups: &[String],
    ) -> Vec<String> {
        if user_id.is_empty() || connection_id.is_empty() {
            return Vec::new();
        }

        let mut state = self.state.write().await;
        match state.connections.get(connection_id) {
            Some(entry) if entry.user_id == user_id => {}
            Some(_) => {
                tracing::warn!(%connection_id, user_id, "unsubscribe ignored: owner mismatch");
                return Vec::new();
            }
            None => return Vec::new(),
        }

        let mut removed = Vec::new();
        for group in groups {
            if state.leave(connection_id, group) {
                removed.push(group.clone());
            }
        }
        debug_assert!(state.is_consistent(), "registry maps diverged after unsubscribe");
        drop(state);

        if !removed.is_empty() {
            tracing::info!(%connection_id, user_id, groups = ?removed, "unsubscribed from groups");
        }
        removed
    }

    /// Removes the connection and every group membership it held.
    ///
    /// Returns the removed entry, or `None` for an unknown connection.
    pub async fn remove_connection(&self, connection_id: &ConnectionId) -> Option<ConnectionEntry> {
        let mut state = self.state.write().await;
        let entry = state.connections.remove(connection_id)?;
        for group in &entry.groups {
            state.detach(connection_id, group);
        }
        debug_assert!(state.is_consistent(), "registry maps diverged after remove");
        drop(state);

        tracing::info!(
            %connection_id,
            user_id = %entry.user_id,
            groups = entry.groups.len(),
            "connection removed from registry"
        );
        Some(entry)
    }

    /// Current members of `group`; empty if the group has none.
    pub async fn group_members(&self, group: &str) -> HashSet<ConnectionId> {
        self.state
            .read()
            .await
            .groups
            .get(group)
            .cloned()
            .unwrap_or_default()
    }

    /// Resolves every member of every group in `groups` from one snapshot.
    ///
    /// A connection belonging to several of the groups appears once.
    pub async fn members_of_groups(&self, groups: &[String]) -> Vec<Recipient> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        let mut recipients = Vec::new();
        for members in groups.iter().filter_map(|g| state.groups.get(g)) {
            for connection_id in members {
                if !seen.insert(connection_id) {
                    continue;
                }
                if let Some(entry) = state.connections.get(connection_id) {
                    recipients.push(Recipient {
                        connection_id: connection_id.clone(),
                        user_id: entry.user_id.clone(),
                    });
                }
            }
        }
        recipients
    }

    /// Distinct names of all groups with at least one member.
    pub async fn all_groups(&self) -> BTreeSet<String> {
        self.state.read().await.groups.keys().cloned().collect()
    }

    /// Groups held by one connection; empty for an unknown connection.
    pub async fn groups_of(&self, connection_id: &ConnectionId) -> BTreeSet<String> {
        self.state
            .read()
            .await
            .connections
            .get(connection_id)
            .map(|e| e.groups.clone())
            .unwrap_or_default()
    }

    /// Snapshot of one connection, if registered.
    pub async fn connection(&self, connection_id: &ConnectionId) -> Option<ConnectionEntry> {
        self.state.read().await.connections.get(connection_id).cloned()
    }

    /// All live connections opened by `user_id`.
    pub async fn connections_of_user(&self, user_id: &str) -> Vec<ConnectionEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<ConnectionEntry> = state
            .connections
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.subscribed_at.cmp(&b.subscribed_at));
        entries
    }

    /// Union of the groups held by any connection of `user_id`.
    pub async fn groups_of_user(&self, user_id: &str) -> BTreeSet<String> {
        self.state
            .read()
            .await
            .connections
            .values()
            .filter(|e| e.user_id == user_id)
            .flat_map(|e| e.groups.iter().cloned())
            .collect()
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }
}
