//! Backend test support utilities
//!
//! Shared by the backend's unit and integration tests: idempotent logging
//! setup and a small JSON-over-WebSocket client.

pub mod logging;
pub mod ws_client;

pub use ws_client::WebSocketClient;
