//! Error codes for the Storyteller backend.
//!
//! This module defines all error codes used throughout the application.
//! Add new codes here; never pass ad-hoc strings as error codes.
//!
//! All error codes are SCREAMING_SNAKE_CASE and map 1:1 to the strings
//! that appear in WebSocket `error` payloads and HTTP problem responses.

use core::fmt;

use serde::{Serialize, Serializer};

/// Centralized error codes.
///
/// Each variant maps to a canonical SCREAMING_SNAKE_CASE string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Protocol
    /// Inbound frame is not a valid `{type, payload}` envelope
    InvalidMessage,

    // Lobby membership
    /// Unknown lobby id on join
    LobbyNotFound,
    /// Requested name already used in the lobby
    NameTaken,
    /// Sender is not allowed to perform the action right now
    NotAuthorized,
    /// Requested game mode is not supported
    InvalidGameMode,

    // System Errors
    /// No lobby id could be allocated
    LobbyCapacity,
    /// Internal server error
    Internal,
    /// Configuration error
    ConfigError,
}

impl ErrorCode {
    /// Returns the canonical SCREAMING_SNAKE_CASE string for this error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidMessage => "INVALID_MESSAGE",

            Self::LobbyNotFound => "LOBBY_NOT_FOUND",
            Self::NameTaken => "NAME_TAKEN",
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::InvalidGameMode => "INVALID_GAME_MODE",

            Self::LobbyCapacity => "LOBBY_CAPACITY",
            Self::Internal => "INTERNAL",
            Self::ConfigError => "CONFIG_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
