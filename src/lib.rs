//! # notify-hub
//!
//! Real-time, group-addressed notification fan-out over WebSocket.
//!
//! Clients connect to `/ws`, join named groups, and receive every event
//! published to those groups. Events are ingested over REST, stamped with
//! the publisher's identity, optionally kept in a bounded in-memory
//! history, and replayed to connections when they join a group.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)      WS Handler (ws/)
//!     │           │                        │
//!     ├── Dispatcher (service/)     ConnectionLifecycle (service/)
//!     │           │                        │
//!     ├── GroupRegistry · HistoryStore · PreferenceStore (domain/)
//!     │
//!     └── Transport → ConnectionHub (transport/)
//! ```
//!
//! Deliveries never run under a registry or history lock; a publish works
//! on a membership snapshot taken at fan-out time.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod transport;
pub mod ws;
