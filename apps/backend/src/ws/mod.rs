pub mod hub;
pub mod session;

pub use hub::{HubStats, LobbyHub};
