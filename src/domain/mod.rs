//! Domain layer: identifiers, events, membership registry, history.
//!
//! This module contains the server-side state of the hub: the registry
//! that answers "who is in which group", the bounded history of published
//! events, and the per-user delivery preferences.

pub mod connection_id;
pub mod event;
pub mod group_registry;
pub mod history_store;
pub mod preferences;

pub use connection_id::ConnectionId;
pub use event::{Event, Notification};
pub use group_registry::{ConnectionEntry, GroupRegistry, Recipient};
pub use history_store::HistoryStore;
pub use preferences::{NotificationPreferences, PreferenceStore};

/// Trims group names, drops blanks and repeats, and keeps first-seen order.
#[must_use]
pub fn normalize_groups<S: AsRef<str>>(groups: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(groups.len());
    for group in groups.iter().map(|g| g.as_ref().trim()) {
        if !group.is_empty() && !out.iter().any(|g| g == group) {
            out.push(group.to_string());
        }
    }
    out
}
