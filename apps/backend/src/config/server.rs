//! Process configuration loaded from environment variables.
//!
//! | variable                     | default   |
//! |------------------------------|-----------|
//! | `BACKEND_HOST`               | `0.0.0.0` |
//! | `BACKEND_PORT`               | `3001`    |
//! | `CORS_ALLOWED_ORIGINS`       | any origin|
//! | `LOBBY_CREATING_TIME_SECS`   | `60`      |
//! | `LOBBY_NARRATION_TIME_SECS`  | `90`      |
//! | `LOBBY_UNJOINED_TTL_SECS`    | `600`     |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::LobbySettings;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin may connect.
    pub cors_origins: Vec<String>,
    pub lobby: LobbySettings,
    /// How long a created lobby may sit without its first player.
    pub unjoined_lobby_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            cors_origins: Vec::new(),
            lobby: LobbySettings::default(),
            unjoined_lobby_ttl: Duration::from_secs(600),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = value("BACKEND_HOST").unwrap_or(defaults.host);
        let port = parse_or("BACKEND_PORT", value("BACKEND_PORT"), defaults.port)?;

        let cors_origins = value("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty() && *s != "null")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let creating_time = parse_or(
            "LOBBY_CREATING_TIME_SECS",
            value("LOBBY_CREATING_TIME_SECS"),
            defaults.lobby.creating_time,
        )?;
        let narration_time = parse_or(
            "LOBBY_NARRATION_TIME_SECS",
            value("LOBBY_NARRATION_TIME_SECS"),
            defaults.lobby.narration_time,
        )?;
        let unjoined_ttl = parse_or(
            "LOBBY_UNJOINED_TTL_SECS",
            value("LOBBY_UNJOINED_TTL_SECS"),
            defaults.unjoined_lobby_ttl.as_secs(),
        )?;
        if creating_time == 0 || narration_time == 0 || unjoined_ttl == 0 {
            return Err(AppError::config("lobby timer defaults must be positive"));
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            lobby: LobbySettings {
                creating_time,
                narration_time,
                ..defaults.lobby
            },
            unjoined_lobby_ttl: Duration::from_secs(unjoined_ttl),
        })
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, AppError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::config(format!("{key} has an invalid value: {raw:?}"))),
    }
}
