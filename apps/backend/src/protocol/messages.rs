use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::{GameMode, LobbyId, Phase};
use crate::errors::{DomainError, ErrorCode};

/// Raw `{ type, payload }` envelope. The payload is decoded once the type is known.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLobby {
    pub lobby_id: LobbyId,
    #[serde(default)]
    pub player_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeName {
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitCreation {
    #[serde(rename = "creationDataURL")]
    pub creation_data_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Decision {
    Continue,
    EndGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FinalDecision {
    pub decision: Decision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureTimers {
    #[serde(deserialize_with = "seconds")]
    pub creating_time: u32,
    #[serde(deserialize_with = "seconds")]
    pub narration_time: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeGameMode {
    /// Validated against the supported modes by the scheduler so an unknown
    /// mode is reported as `INVALID_GAME_MODE` rather than a parse failure.
    pub game_mode: String,
}

/// Inbound messages understood by the lobby engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMsg {
    JoinLobby(JoinLobby),
    ChangeName(ChangeName),
    StartGame,
    SubmitCreation(SubmitCreation),
    NotReady,
    FinalDecision(FinalDecision),
    FinishedNarrating,
    ConfigureTimers(ConfigureTimers),
    ChangeGameMode(ChangeGameMode),
}

impl ClientMsg {
    /// Parses one text frame.
    ///
    /// Returns `Ok(None)` for a well-formed envelope whose type is unknown so
    /// newer clients can talk to older servers.
    pub fn parse(text: &str) -> Result<Option<Self>, DomainError> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|err| DomainError::invalid_message(format!("malformed envelope: {err}")))?;

        let payload = match envelope.payload {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        let msg = match envelope.kind.as_str() {
            "joinLobby" => Self::JoinLobby(decode(&envelope.kind, payload)?),
            "changeName" => Self::ChangeName(decode(&envelope.kind, payload)?),
            "startGame" => Self::StartGame,
            "submitCreation" => Self::SubmitCreation(decode(&envelope.kind, payload)?),
            "notReady" => Self::NotReady,
            "finalDecision" => Self::FinalDecision(decode(&envelope.kind, payload)?),
            "finishedNarrating" => Self::FinishedNarrating,
            "configureTimers" => Self::ConfigureTimers(decode(&envelope.kind, payload)?),
            "changeGameMode" => Self::ChangeGameMode(decode(&envelope.kind, payload)?),
            _ => return Ok(None),
        };
        Ok(Some(msg))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinLobby(_) => "joinLobby",
            Self::ChangeName(_) => "changeName",
            Self::StartGame => "startGame",
            Self::SubmitCreation(_) => "submitCreation",
            Self::NotReady => "notReady",
            Self::FinalDecision(_) => "finalDecision",
            Self::FinishedNarrating => "finishedNarrating",
            Self::ConfigureTimers(_) => "configureTimers",
            Self::ChangeGameMode(_) => "changeGameMode",
        }
    }
}

fn decode<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T, DomainError> {
    serde_json::from_value(payload)
        .map_err(|err| DomainError::invalid_message(format!("bad {kind} payload: {err}")))
}

// Timer inputs come from number fields that some clients send as strings.
fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Outbound messages, serialized as `{ "type": ..., "payload": {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMsg {
    #[serde(rename_all = "camelCase")]
    JoinSuccess {
        lobby_id: LobbyId,
        player_names: Vec<String>,
        admin_name: String,
        player_name: String,
        game_started: bool,
        game_phase: Phase,
        turn_order: Vec<String>,
        creating_time: u32,
        narration_time: u32,
        game_mode: GameMode,
    },

    Error {
        code: ErrorCode,
        message: String,
    },

    #[serde(rename_all = "camelCase")]
    UpdatePlayerList {
        player_names: Vec<String>,
        admin_name: String,
    },

    #[serde(rename_all = "camelCase")]
    GameStarted {
        game_phase: Phase,
        game_mode: GameMode,
    },

    #[serde(rename_all = "camelCase")]
    StartCreating { creating_time: u32 },

    #[serde(rename_all = "camelCase")]
    YourTurn {
        creation: String,
        creation_owner: String,
        story_time: u32,
        game_mode: GameMode,
    },

    #[serde(rename_all = "camelCase")]
    PlayerNarrating {
        creation: String,
        creation_owner: String,
        narrating_player: String,
        story_time: u32,
        game_mode: GameMode,
    },

    GameEnded {},

    #[serde(rename_all = "camelCase")]
    ReturnToLobby { game_mode: GameMode },

    #[serde(rename_all = "camelCase")]
    TimerConfigured {
        creating_time: u32,
        narration_time: u32,
    },

    #[serde(rename_all = "camelCase")]
    GameModeChange { game_mode: GameMode },

    #[serde(rename_all = "camelCase")]
    NameChangeSuccess { player_name: String },
}

impl ServerMsg {
    pub fn error(err: &DomainError) -> Self {
        ServerMsg::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMsg::JoinSuccess { .. } => "joinSuccess",
            ServerMsg::Error { .. } => "error",
            ServerMsg::UpdatePlayerList { .. } => "updatePlayerList",
            ServerMsg::GameStarted { .. } => "gameStarted",
            ServerMsg::StartCreating { .. } => "startCreating",
            ServerMsg::YourTurn { .. } => "yourTurn",
            ServerMsg::PlayerNarrating { .. } => "playerNarrating",
            ServerMsg::GameEnded {} => "gameEnded",
            ServerMsg::ReturnToLobby { .. } => "returnToLobby",
            ServerMsg::TimerConfigured { .. } => "timerConfigured",
            ServerMsg::GameModeChange { .. } => "gameModeChange",
            ServerMsg::NameChangeSuccess { .. } => "nameChangeSuccess",
        }
    }
}
