use actix::Addr;

use crate::ws::hub::LobbyHub;

/// Shared handles for request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Mailbox of the actor owning all lobby state.
    pub hub: Addr<LobbyHub>,
}

impl AppState {
    pub fn new(hub: Addr<LobbyHub>) -> Self {
        Self { hub }
    }
}
