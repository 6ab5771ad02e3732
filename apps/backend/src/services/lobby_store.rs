use std::collections::HashMap;

use rand::Rng;
use tracing::{debug, warn};

use crate::domain::{Lobby, LobbyId, LobbySettings};
use crate::errors::DomainError;

/// Random draws before falling back to a linear scan of the id space.
const RANDOM_ATTEMPTS: usize = 32;

/// Owns every live lobby, keyed by its four-digit id.
#[derive(Debug, Default)]
pub struct LobbyStore {
    lobbies: HashMap<LobbyId, Lobby>,
    settings: LobbySettings,
}

impl LobbyStore {
    pub fn new(settings: LobbySettings) -> Self {
        Self {
            lobbies: HashMap::new(),
            settings,
        }
    }

    /// Allocates a fresh id and inserts an empty lobby under it.
    ///
    /// Existing lobbies are never replaced. When every id is in use the call
    /// fails with [`DomainError::LobbyCapacity`].
    pub fn create<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<LobbyId, DomainError> {
        let id = self.allocate_id(rng)?;
        self.lobbies.insert(id, Lobby::new(id, self.settings));
        debug!(lobby_id = %id, live = self.lobbies.len(), "lobby created");
        Ok(id)
    }

    fn allocate_id<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<LobbyId, DomainError> {
        for _ in 0..RANDOM_ATTEMPTS {
            let candidate = LobbyId::random(rng);
            if !self.lobbies.contains_key(&candidate) {
                return Ok(candidate);
            }
        }

        // Crowded; walk the range from a random start so ids stay spread out.
        let span = LobbyId::MAX - LobbyId::MIN + 1;
        let offset = rng.random_range(0..span);
        (0..span)
            .map(|step| LobbyId::new(LobbyId::MIN + (offset + step) % span))
            .find(|candidate| !self.lobbies.contains_key(candidate))
            .ok_or_else(|| {
                warn!(live = self.lobbies.len(), "lobby id space exhausted");
                DomainError::LobbyCapacity
            })
    }

    pub fn get(&self, id: LobbyId) -> Option<&Lobby> {
        self.lobbies.get(&id)
    }

    pub fn get_mut(&mut self, id: LobbyId) -> Option<&mut Lobby> {
        self.lobbies.get_mut(&id)
    }

    pub fn contains(&self, id: LobbyId) -> bool {
        self.lobbies.contains_key(&id)
    }

    pub fn remove(&mut self, id: LobbyId) -> Option<Lobby> {
        let removed = self.lobbies.remove(&id);
        if removed.is_some() {
            debug!(lobby_id = %id, live = self.lobbies.len(), "lobby removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }
}
