//! Bounded, volatile event history.
//!
//! [`HistoryStore`] keeps one global sequence of events, newest first,
//! capped at a fixed capacity. Per-user, per-role and per-group views are
//! computed from that sequence on every query instead of being kept as
//! separate indexes.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{Event, normalize_groups};
use crate::error::HubError;

/// Default number of retained events.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Default result size when a caller does not pass a limit.
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Fixed-capacity event cache that evicts the oldest entry on overflow.
#[derive(Debug)]
pub struct HistoryStore {
    events: RwLock<VecDeque<Arc<Event>>>,
    capacity: usize,
    default_limit: usize,
}

impl HistoryStore {
    /// Creates an empty store. A zero `capacity` is raised to one.
    #[must_use]
    pub fn new(capacity: usize, default_limit: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            default_limit,
        }
    }

    /// Inserts `event` as the newest entry, evicting from the old end until
    /// the store is back at capacity.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Storage`] if the sequence cannot grow to hold
    /// the new entry.
    pub async fn append(&self, event: Arc<Event>) -> Result<(), HubError> {
        let mut events = self.events.write().await;
        events
            .try_reserve(1)
            .map_err(|e| HubError::Storage(format!("history append: {e}")))?;
        events.push_front(event);
        let mut evicted = 0_usize;
        while events.len() > self.capacity {
            events.pop_back();
            evicted = evicted.saturating_add(1);
        }
        let len = events.len();
        drop(events);

        if evicted > 0 {
            tracing::debug!(evicted, len, "history at capacity, evicted oldest");
        }
        Ok(())
    }

    /// Most recent events of any kind.
    pub async fn query_global(&self, limit: Option<usize>) -> Vec<Arc<Event>> {
        self.collect(limit, |_| true).await
    }

    /// Most recent events published by `user_id`.
    pub async fn query_by_user(&self, user_id: &str, limit: Option<usize>) -> Vec<Arc<Event>> {
        self.collect(limit, |e| e.user_id() == Some(user_id)).await
    }

    /// Most recent events published under `role`.
    pub async fn query_by_role(&self, role: &str, limit: Option<usize>) -> Vec<Arc<Event>> {
        self.collect(limit, |e| e.role() == Some(role)).await
    }

    /// Most recent events addressed to at least one of `groups`.
    ///
    /// Group names are matched after trimming. An empty (or all-blank)
    /// `groups` slice always yields an empty result.
    pub async fn query_by_groups(&self, groups: &[String], limit: Option<usize>) -> Vec<Arc<Event>> {
        let groups = normalize_groups(groups);
        if groups.is_empty() {
            return Vec::new();
        }
        let wanted: HashSet<&str> = groups.iter().map(String::as_str).collect();
        let found = self.collect(limit, |e| e.targets_any(&wanted)).await;
        tracing::debug!(count = found.len(), ?groups, "history query by groups");
        found
    }

    /// Number of retained events.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns `true` if no event is retained.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Maximum number of retained events.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    async fn collect<F>(&self, limit: Option<usize>, matches: F) -> Vec<Arc<Event>>
    where
        F: Fn(&Event) -> bool,
    {
        let limit = limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Vec::new();
        }
        self.events
            .read()
            .await
            .iter()
            .filter(|event| matches(event.as_ref()))
            .take(limit)
            .map(Arc::clone)
            .collect()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_QUERY_LIMIT)
    }
}
