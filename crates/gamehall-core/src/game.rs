//! Shared match data model.
//!
//! This module contains the game type enumeration, the immutable
//! `GameState` snapshot handed to the transport, and `GameError`.

use crate::actions::HistoryEntry;
use crate::games::{
    chess::ChessBoard,
    go::GoBoard,
    gomoku::GomokuBoard,
    mahjong::{MahjongTable, Tile},
    poker::{Card, PokerTable},
    werewolf::{Role, WerewolfBoard},
    xiangqi::XiangqiBoard,
};
use crate::player::{Player, PlayerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Every game the server can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    /// Five-in-a-row
    Gomoku,
    Chess,
    ChineseChess,
    Go,
    /// Poker-like card game
    Poker,
    /// Werewolf-style social deduction
    Werewolf,
    /// Mahjong-style tile drawing
    Mahjong,
}

impl GameType {
    pub const ALL: [GameType; 7] = [
        GameType::Gomoku,
        GameType::Chess,
        GameType::ChineseChess,
        GameType::Go,
        GameType::Poker,
        GameType::Werewolf,
        GameType::Mahjong,
    ];

    /// Canonical wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Gomoku => "gomoku",
            GameType::Chess => "chess",
            GameType::ChineseChess => "chinese_chess",
            GameType::Go => "go",
            GameType::Poker => "poker",
            GameType::Werewolf => "werewolf",
            GameType::Mahjong => "mahjong",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a game type name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported game type: {0}")]
pub struct UnsupportedGameType(pub String);

impl FromStr for GameType {
    type Err = UnsupportedGameType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "gomoku" | "five_in_a_row" => Ok(GameType::Gomoku),
            "chess" => Ok(GameType::Chess),
            "chinese_chess" | "cn_chess" | "xiangqi" => Ok(GameType::ChineseChess),
            "go" => Ok(GameType::Go),
            "poker" | "card_game" => Ok(GameType::Poker),
            "werewolf" | "social_deduction" => Ok(GameType::Werewolf),
            "mahjong" | "tile_game" | "sichuan_mahjong" => Ok(GameType::Mahjong),
            _ => Err(UnsupportedGameType(s.to_string())),
        }
    }
}

/// Lifecycle of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    WaitingForPlayers,
    InProgress,
    Finished,
}

/// Game-specific board payload of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardState {
    Gomoku(GomokuBoard),
    Chess(ChessBoard),
    ChineseChess(XiangqiBoard),
    Go(GoBoard),
    Poker(PokerTable),
    Werewolf(WerewolfBoard),
    Mahjong(MahjongTable),
}

impl BoardState {
    pub fn game_type(&self) -> GameType {
        match self {
            BoardState::Gomoku(_) => GameType::Gomoku,
            BoardState::Chess(_) => GameType::Chess,
            BoardState::ChineseChess(_) => GameType::ChineseChess,
            BoardState::Go(_) => GameType::Go,
            BoardState::Poker(_) => GameType::Poker,
            BoardState::Werewolf(_) => GameType::Werewolf,
            BoardState::Mahjong(_) => GameType::Mahjong,
        }
    }
}

/// What only one seat may see: hole cards, a secret role, a concealed hand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrivateView {
    HoleCards { cards: Vec<Card> },
    Role { role: Role },
    Hand { tiles: Vec<Tile> },
}

/// Entries of history carried by a snapshot
pub const HISTORY_WINDOW: usize = 64;

/// Immutable point-in-time view of a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub match_id: Uuid,
    pub game_type: GameType,
    pub status: MatchStatus,
    /// Players in seat order
    pub players: Vec<Player>,
    /// Index into `players` of the player who may act
    pub current_turn: usize,
    pub board: BoardState,
    /// The most recent history entries, at most [`HISTORY_WINDOW`]
    pub history: Vec<HistoryEntry>,
    /// Length of the full history
    pub history_len: usize,
    pub winner: Option<Player>,
}

impl GameState {
    /// The player the turn indicator points at
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_turn)
    }

    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }
}

/// Errors that can occur when driving a match
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Player {0} is already in the game")]
    DuplicatePlayer(PlayerId),

    #[error("Player {0} is not in the game")]
    UnknownPlayer(PlayerId),

    #[error("Game is full")]
    GameFull,

    #[error("Game has not started")]
    NotStarted,

    #[error("Game already started")]
    AlreadyStarted,

    #[error("Game is over")]
    GameOver,

    #[error("{game} needs {min}..={max} players, got {actual}")]
    WrongPlayerCount {
        game: GameType,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("No saved state at index {0}")]
    NoSuchCheckpoint(usize),
}

impl GameError {
    /// Stable code for the wire
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotYourTurn => "not_your_turn",
            GameError::InvalidAction(_) => "invalid_action",
            GameError::InvalidMove(_) => "invalid_move",
            GameError::DuplicatePlayer(_) => "duplicate_player",
            GameError::UnknownPlayer(_) => "player_not_found",
            GameError::GameFull => "game_full",
            GameError::NotStarted => "game_not_started",
            GameError::AlreadyStarted => "game_already_started",
            GameError::GameOver => "game_over",
            GameError::WrongPlayerCount { .. } => "wrong_player_count",
            GameError::NoSuchCheckpoint(_) => "no_such_checkpoint",
        }
    }

    /// Whether the action was rejected for being out of turn
    pub fn is_turn_violation(&self) -> bool {
        matches!(self, GameError::NotYourTurn)
    }

    /// Whether the action itself was malformed or illegal
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, GameError::InvalidAction(_) | GameError::InvalidMove(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_game_type_aliases() {
        assert_eq!("gomoku".parse::<GameType>().unwrap(), GameType::Gomoku);
        assert_eq!("five-in-a-row".parse::<GameType>().unwrap(), GameType::Gomoku);
        assert_eq!("cn_chess".parse::<GameType>().unwrap(), GameType::ChineseChess);
        assert_eq!("Xiangqi".parse::<GameType>().unwrap(), GameType::ChineseChess);
        assert_eq!("tile_game".parse::<GameType>().unwrap(), GameType::Mahjong);
        assert_eq!(
            "js_red_alert".parse::<GameType>(),
            Err(UnsupportedGameType("js_red_alert".into()))
        );
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for game_type in GameType::ALL {
            assert_eq!(game_type.as_str().parse::<GameType>().unwrap(), game_type);
            let json = serde_json::to_string(&game_type).unwrap();
            assert_eq!(json, format!("\"{}\"", game_type.as_str()));
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(GameError::NotYourTurn.is_turn_violation());
        assert!(!GameError::NotYourTurn.is_validation_failure());
        assert!(GameError::InvalidMove("occupied".into()).is_validation_failure());
        assert_eq!(GameError::NotYourTurn.code(), "not_your_turn");
    }
}
