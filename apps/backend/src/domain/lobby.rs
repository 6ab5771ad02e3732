//! Lobby aggregate: players, phase, per-round creation state and timer tokens.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// Identity of one live WebSocket connection.
pub type ConnId = Uuid;

/// Short numeric lobby identifier handed out by `/create-lobby`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LobbyId(u32);

impl LobbyId {
    pub const MIN: u32 = 1000;
    pub const MAX: u32 = 9999;

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Uniform pick from the four-digit range.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.random_range(Self::MIN..=Self::MAX))
    }
}

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LobbyId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(Self)
    }
}

// Browsers send the id as typed into the join form, so accept "1234" as well as 1234.
impl<'de> Deserialize<'de> for LobbyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Kind of creation players produce this game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Drawings,
    Pictures,
    #[serde(rename = "AI")]
    Ai,
}

impl GameMode {
    pub const ALL: [GameMode; 3] = [GameMode::Drawings, GameMode::Pictures, GameMode::Ai];

    pub const fn as_str(self) -> &'static str {
        match self {
            GameMode::Drawings => "Drawings",
            GameMode::Pictures => "Pictures",
            GameMode::Ai => "AI",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| DomainError::InvalidGameMode(s.to_string()))
    }
}

/// Lobby phase state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Pre-game, or back in the lobby after `endGame`.
    #[default]
    Waiting,
    /// Players are producing their creation for the round.
    CollectCreations,
    /// Players take turns narrating creations from the pool.
    Narrate,
    /// Round over; waiting for the admin's decision.
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Creating,
    Turn,
}

/// Identifies one armed timer. A firing whose token is not the lobby's
/// current token of that kind is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub conn_id: ConnId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creation {
    pub owner: String,
    /// Image as a data URI; never inspected.
    pub payload: String,
}

/// Values a fresh lobby starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbySettings {
    pub creating_time: u32,
    pub narration_time: u32,
    pub game_mode: GameMode,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            creating_time: 60,
            narration_time: 90,
            game_mode: GameMode::Drawings,
        }
    }
}

/// One game session.
#[derive(Debug, Clone)]
pub struct Lobby {
    pub id: LobbyId,
    /// Join order.
    pub players: Vec<Player>,
    pub admin_name: Option<String>,
    pub game_started: bool,
    pub game_mode: GameMode,
    pub phase: Phase,
    /// Current round submissions keyed by owner name.
    pub creations: BTreeMap<String, Creation>,
    /// Creations still available for narration this round.
    pub pool: Vec<Creation>,
    /// Owners whose creation was already narrated this round.
    pub used_creations: BTreeSet<String>,
    /// Fixed at round start; departed players stay in it and are skipped.
    pub turn_order: Vec<String>,
    pub current_turn_index: usize,
    pub current_narrator: Option<String>,
    /// Seconds.
    pub creating_time: u32,
    /// Seconds.
    pub narration_time: u32,
    creating_timer: Option<TimerToken>,
    turn_timer: Option<TimerToken>,
    next_timer_token: u64,
}

impl Lobby {
    pub fn new(id: LobbyId, settings: LobbySettings) -> Self {
        Self {
            id,
            players: Vec::new(),
            admin_name: None,
            game_started: false,
            game_mode: settings.game_mode,
            phase: Phase::Waiting,
            creations: BTreeMap::new(),
            pool: Vec::new(),
            used_creations: BTreeSet::new(),
            turn_order: Vec::new(),
            current_turn_index: 0,
            current_narrator: None,
            creating_time: settings.creating_time,
            narration_time: settings.narration_time,
            creating_timer: None,
            turn_timer: None,
            next_timer_token: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player_names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    pub fn has_player(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
    }

    /// A name is in use while a player holds it, and while the running game
    /// still has round state keyed by it (departed players included).
    pub fn name_in_use(&self, name: &str) -> bool {
        self.has_player(name) || (self.game_started && self.round_refers_to(name))
    }

    fn round_refers_to(&self, name: &str) -> bool {
        self.turn_order.iter().any(|n| n == name)
            || self.creations.contains_key(name)
            || self.used_creations.contains(name)
            || self.pool.iter().any(|c| c.owner == name)
            || self.current_narrator.as_deref() == Some(name)
    }

    pub fn player_by_conn(&self, conn_id: ConnId) -> Option<&Player> {
        self.players.iter().find(|p| p.conn_id == conn_id)
    }

    pub fn is_admin(&self, name: &str) -> bool {
        self.admin_name.as_deref() == Some(name)
    }

    /// Appends a player; the first player of an empty lobby becomes admin.
    pub fn add_player(&mut self, player: Player) {
        if self.admin_name.is_none() {
            self.admin_name = Some(player.name.clone());
        }
        self.players.push(player);
    }

    /// Removes the player bound to `conn_id`. Admin reassignment is the
    /// caller's job.
    pub fn remove_player(&mut self, conn_id: ConnId) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.conn_id == conn_id)?;
        Some(self.players.remove(idx))
    }

    /// Renames a player and re-keys every piece of round state that refers
    /// to the old name. The caller checks `name_in_use` first.
    pub fn rename_player(&mut self, old: &str, new: &str) {
        let Some(player) = self.players.iter_mut().find(|p| p.name == old) else {
            return;
        };
        player.name = new.to_string();

        if self.is_admin(old) {
            self.admin_name = Some(new.to_string());
        }
        if let Some(mut creation) = self.creations.remove(old) {
            creation.owner = new.to_string();
            self.creations.insert(new.to_string(), creation);
        }
        for creation in self.pool.iter_mut().filter(|c| c.owner == old) {
            creation.owner = new.to_string();
        }
        if self.used_creations.remove(old) {
            self.used_creations.insert(new.to_string());
        }
        for entry in self.turn_order.iter_mut().filter(|n| n.as_str() == old) {
            *entry = new.to_string();
        }
        if self.current_narrator.as_deref() == Some(old) {
            self.current_narrator = Some(new.to_string());
        }
    }

    /// Every connected player has a submission on file.
    pub fn all_submitted(&self) -> bool {
        self.creations.len() == self.players.len()
    }

    pub fn timer(&self, kind: TimerKind) -> Option<TimerToken> {
        match kind {
            TimerKind::Creating => self.creating_timer,
            TimerKind::Turn => self.turn_timer,
        }
    }

    /// Records a fresh token for `kind`, superseding any previous one.
    pub(crate) fn arm_timer(&mut self, kind: TimerKind) -> TimerToken {
        self.next_timer_token += 1;
        let token = TimerToken(self.next_timer_token);
        match kind {
            TimerKind::Creating => self.creating_timer = Some(token),
            TimerKind::Turn => self.turn_timer = Some(token),
        }
        token
    }

    pub(crate) fn clear_timer(&mut self, kind: TimerKind) -> Option<TimerToken> {
        match kind {
            TimerKind::Creating => self.creating_timer.take(),
            TimerKind::Turn => self.turn_timer.take(),
        }
    }
}
