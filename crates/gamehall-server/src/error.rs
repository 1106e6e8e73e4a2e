//! Server error types.

use gamehall_core::{GameError, GameType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unsupported game type: {0}")]
    UnsupportedGameType(String),

    #[error("Failed to construct {game} engine: {reason}")]
    Construction { game: GameType, reason: String },

    #[error("{game} engine unavailable after {attempts} attempts: {reason}")]
    EngineUnavailable {
        game: GameType,
        attempts: u32,
        reason: String,
    },
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::UnsupportedGameType(_) => "unsupported_game_type",
            RegistryError::Construction { .. } | RegistryError::EngineUnavailable { .. } => {
                "service_unavailable"
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Match not found")]
    MatchNotFound,

    #[error("Not in a match")]
    NotInMatch,

    #[error("Already in a match")]
    AlreadyInMatch,

    #[error("Not the host")]
    NotHost,

    #[error("Match is unavailable")]
    MatchUnavailable,

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl RoomError {
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::MatchNotFound => "match_not_found",
            RoomError::NotInMatch => "not_in_match",
            RoomError::AlreadyInMatch => "already_in_match",
            RoomError::NotHost => "not_host",
            RoomError::MatchUnavailable => "match_unavailable",
            RoomError::Game(e) => e.code(),
            RoomError::Registry(e) => e.code(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}")]
    InvalidVar { var: &'static str, value: String },

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}
