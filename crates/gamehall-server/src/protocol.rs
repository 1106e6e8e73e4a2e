//! WebSocket protocol messages for Gamehall matches.

use crate::registry::EngineStats;
use gamehall_core::{ActionResult, GameState, GameType, MatchStatus, Player, PrivateView};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Open a new match of the named game type
    CreateMatch {
        game_type: String,
        player_name: String,
    },

    /// Join an existing match
    JoinMatch { match_id: Uuid, player_name: String },

    /// Leave current match
    LeaveMatch,

    /// Start the match (host only)
    StartMatch,

    /// Submit a game action
    GameAction { action: serde_json::Value },

    /// Restore an earlier checkpoint (host only)
    Undo { checkpoint: usize },

    /// Flip night and day in werewolf (host only)
    TogglePhase,

    /// Send chat message
    Chat { message: String },

    /// Request list of matches waiting for players
    ListMatches,

    /// Request engine cache statistics
    EngineStats,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned player ID
    Welcome { player_id: Uuid },

    /// Match created successfully
    MatchCreated { match_id: Uuid },

    /// Joined match successfully
    JoinedMatch { info: MatchInfo },

    /// Left match successfully
    LeftMatch,

    /// Match roster or status changed
    MatchUpdated { info: MatchInfo },

    /// Match started
    GameStarted { state: GameState },

    /// Outcome of the sender's own action
    ActionResult(ActionResult),

    /// Public game state updated
    GameState { state: GameState },

    /// Information only the receiving seat may see
    PrivateState { view: PrivateView },

    /// Current player changed
    TurnChanged {
        seat: usize,
        player_id: Option<Uuid>,
    },

    /// Chat message received
    ChatMessage { player_name: String, message: String },

    /// Matches waiting for players
    MatchList { matches: Vec<MatchInfo> },

    /// Engine cache statistics by game type
    EngineStats {
        stats: BTreeMap<GameType, EngineStats>,
    },

    /// Error occurred
    Error { code: String, message: String },

    /// Pong response
    Pong,

    /// Match finished; no winner on a draw or an exhausted wall
    GameOver { winner: Option<Player> },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl ToString) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Match information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchInfo {
    pub id: Uuid,
    pub name: String,
    pub game_type: GameType,
    pub players: Vec<PlayerInfo>,
    pub max_players: usize,
    pub host_id: Uuid,
    pub status: MatchStatus,
}

/// Player information in a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: Uuid,
    pub name: String,
    /// Seat in the game roster, once seated
    pub seat: Option<usize>,
    pub connected: bool,
}
