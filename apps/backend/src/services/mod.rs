//! Stateful services owned by the lobby hub.

pub mod lobby_store;
pub mod registry;

pub use lobby_store::LobbyStore;
pub use registry::ConnectionRegistry;
