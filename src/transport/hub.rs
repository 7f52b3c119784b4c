//! In-process WebSocket transport.
//!
//! [`ConnectionHub`] owns one bounded outbound queue per live WebSocket
//! session. The socket task drains its queue; everyone else enqueues with
//! `try_send`, so a slow client only ever loses its own messages.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};

use super::{OutboundMessage, Transport};
use crate::domain::ConnectionId;
use crate::error::HubError;

/// Default per-connection outbound queue length.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

#[derive(Debug)]
struct Session {
    sender: mpsc::Sender<OutboundMessage>,
    groups: BTreeSet<String>,
}

/// Registry of live socket sessions and their transport-level groups.
#[derive(Debug)]
pub struct ConnectionHub {
    sessions: RwLock<HashMap<ConnectionId, Session>>,
    buffer: usize,
}

impl ConnectionHub {
    /// Creates an empty hub whose sessions queue up to `buffer` messages.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Opens a session for `connection_id` and returns the receiving end of
    /// its outbound queue. An existing session under the same id is
    /// replaced.
    pub async fn register(&self, connection_id: ConnectionId) -> mpsc::Receiver<OutboundMessage> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let session = Session {
            sender,
            groups: BTreeSet::new(),
        };
        if self
            .sessions
            .write()
            .await
            .insert(connection_id.clone(), session)
            .is_some()
        {
            tracing::warn!(%connection_id, "replaced existing transport session");
        }
        receiver
    }

    /// Closes the session. Returns `false` if it was not open.
    pub async fn unregister(&self, connection_id: &ConnectionId) -> bool {
        self.sessions.write().await.remove(connection_id).is_some()
    }

    /// Number of open sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_BUFFER)
    }
}

#[async_trait]
impl Transport for ConnectionHub {
    async fn join_group(&self, connection_id: &ConnectionId, group: &str) -> Result<(), HubError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(connection_id)
            .ok_or_else(|| HubError::ConnectionNotFound(connection_id.clone()))?;
        session.groups.insert(group.to_string());
        Ok(())
    }

    async fn leave_group(&self, connection_id: &ConnectionId, group: &str) -> Result<(), HubError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(connection_id)
            .ok_or_else(|| HubError::ConnectionNotFound(connection_id.clone()))?;
        session.groups.remove(group);
        Ok(())
    }

    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        message: OutboundMessage,
    ) -> Result<(), HubError> {
        let sender = self
            .sessions
            .read()
            .await
            .get(connection_id)
            .map(|s| s.sender.clone())
            .ok_or_else(|| HubError::ConnectionNotFound(connection_id.clone()))?;

        sender.try_send(message).map_err(|e| {
            let (reason, dropped) = match e {
                mpsc::error::TrySendError::Full(m) => ("outbound queue full", m),
                mpsc::error::TrySendError::Closed(m) => ("connection closed", m),
            };
            tracing::debug!(%connection_id, kind = dropped.kind(), reason, "outbound message dropped");
            HubError::Delivery {
                connection_id: connection_id.clone(),
                reason: reason.to_string(),
            }
        })
    }

    async fn joined_groups(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<BTreeSet<String>, HubError> {
        self.sessions
            .read()
            .await
            .get(connection_id)
            .map(|s| s.groups.clone())
            .ok_or_else(|| HubError::ConnectionNotFound(connection_id.clone()))
    }
}
