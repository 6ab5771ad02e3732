//! Domain-level error type used by the lobby engine.
//!
//! This error type is transport-agnostic. The WebSocket layer reports it to
//! the offending connection as an `error` message; HTTP handlers convert it
//! into `AppError` through the provided `From<DomainError>` implementation.

use thiserror::Error;

use crate::domain::LobbyId;
use crate::errors::ErrorCode;

/// Central domain error type. Every variant is recoverable and local to the
/// connection that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Inbound message could not be understood
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    /// Join targeted a lobby that does not exist
    #[error("lobby {0} not found")]
    LobbyNotFound(LobbyId),
    /// Name already used by another player of the lobby
    #[error("name {0:?} is already taken")]
    NameTaken(String),
    /// Not admin, or action outside its valid phase
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    /// Game mode outside the supported set
    #[error("invalid game mode {0:?}")]
    InvalidGameMode(String),
    /// Every lobby id is in use
    #[error("no free lobby id available")]
    LobbyCapacity,
}

impl DomainError {
    pub fn invalid_message(detail: impl Into<String>) -> Self {
        Self::InvalidMessage(detail.into())
    }

    pub fn not_authorized(detail: impl Into<String>) -> Self {
        Self::NotAuthorized(detail.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidMessage(_) => ErrorCode::InvalidMessage,
            Self::LobbyNotFound(_) => ErrorCode::LobbyNotFound,
            Self::NameTaken(_) => ErrorCode::NameTaken,
            Self::NotAuthorized(_) => ErrorCode::NotAuthorized,
            Self::InvalidGameMode(_) => ErrorCode::InvalidGameMode,
            Self::LobbyCapacity => ErrorCode::LobbyCapacity,
        }
    }
}
