//! WebSocket layer: connection handling and message routing.
//!
//! The WebSocket endpoint at `/ws` carries group commands from the client
//! and pushes notifications and history batches to it.

pub mod connection;
pub mod handler;
pub mod messages;
