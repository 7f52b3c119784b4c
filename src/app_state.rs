//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::HubConfig;
use crate::domain::{GroupRegistry, HistoryStore, PreferenceStore};
use crate::service::{ConnectionLifecycle, Dispatcher};
use crate::transport::{ConnectionHub, Transport};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Publish fan-out.
    pub dispatcher: Arc<Dispatcher>,
    /// Connect/disconnect/subscribe handling.
    pub lifecycle: Arc<ConnectionLifecycle>,
    /// Membership registry, read by the reporting endpoints.
    pub registry: Arc<GroupRegistry>,
    /// Event history, read by the reporting endpoints.
    pub history: Arc<HistoryStore>,
    /// Live WebSocket sessions.
    pub hub: Arc<ConnectionHub>,
    /// Loaded configuration.
    pub config: Arc<HubConfig>,
}

impl AppState {
    /// Wires the domain, transport and service layers from `config`.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        let registry = Arc::new(GroupRegistry::new());
        let history = Arc::new(HistoryStore::new(
            config.history_capacity,
            config.history_default_limit,
        ));
        let preferences = Arc::new(PreferenceStore::new());
        let hub = Arc::new(ConnectionHub::new(config.outbound_buffer));
        let transport: Arc<dyn Transport> = Arc::clone(&hub) as Arc<dyn Transport>;

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&history),
            Arc::clone(&preferences),
            Arc::clone(&transport),
        ));
        let lifecycle = Arc::new(ConnectionLifecycle::new(
            Arc::clone(&registry),
            Arc::clone(&history),
            preferences,
            transport,
            Some(config.history_default_limit),
        ));

        Self {
            dispatcher,
            lifecycle,
            registry,
            history,
            hub,
            config: Arc::new(config),
        }
    }
}
