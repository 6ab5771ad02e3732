//! Domain layer: pure lobby and round logic.
//!
//! Nothing in here performs I/O or reads the clock. Functions mutate a
//! [`Lobby`] in place and describe their side effects in an [`Outbox`].

pub mod lobby;
pub mod nickname;
pub mod outbox;
pub mod scheduler;

#[cfg(test)]
mod tests_props_turns;
#[cfg(test)]
mod tests_scheduler;

// Re-exports for ergonomics
pub use lobby::{
    ConnId, Creation, GameMode, Lobby, LobbyId, LobbySettings, Phase, Player, TimerKind,
    TimerToken,
};
pub use nickname::{assign_nickname, validate_rename, NICKNAME_POOL};
pub use outbox::{Delivery, Outbox, TimerCommand};
