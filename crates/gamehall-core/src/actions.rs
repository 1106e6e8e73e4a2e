//! Player actions and what a match records about them.
//!
//! Actions travel as a JSON object with a `type` tag and flattened
//! game-specific fields, e.g. `{"type": "place", "x": 7, "y": 5}`. Each
//! engine decodes them into its own typed action enum.

use crate::game::{GameError, GameState};
use crate::player::PlayerId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A player-submitted intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    /// Acting player
    pub player_id: PlayerId,
    /// Action kind, e.g. `move`, `raise`, `vote`
    #[serde(rename = "type")]
    pub kind: String,
    /// Action-specific fields
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl PlayerAction {
    /// Create an action with no payload fields
    pub fn new(player_id: impl Into<PlayerId>, kind: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Add a payload field
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(field.to_string(), value.into());
        self
    }

    /// Build an action from a transport object `{type, ...fields}`
    pub fn from_value(player_id: PlayerId, value: Value) -> Result<Self, GameError> {
        let Value::Object(mut fields) = value else {
            return Err(GameError::InvalidAction("action must be an object".into()));
        };
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(GameError::InvalidAction("action is missing its type".into())),
        };
        // The acting player comes from the connection, never from the payload
        fields.remove("player_id");
        Ok(Self {
            player_id,
            kind,
            payload: fields,
        })
    }

    /// Decode into an engine's typed action
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, GameError> {
        let mut fields = self.payload.clone();
        fields.insert("type".to_string(), Value::String(self.kind.clone()));
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| GameError::InvalidAction(format!("{}: {}", self.kind, e)))
    }
}

/// One entry of a match's append-only history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// An accepted action
    Action {
        /// 1-based position in the history
        sequence: usize,
        player_id: PlayerId,
        action: PlayerAction,
        /// Turn indicator after the action was applied
        turn_after: usize,
    },
    /// A saved checkpoint was restored
    Restored { sequence: usize, checkpoint: usize },
    /// A host-driven change such as a phase flip
    Transition { sequence: usize, description: String },
}

impl HistoryEntry {
    pub fn sequence(&self) -> usize {
        match self {
            HistoryEntry::Action { sequence, .. }
            | HistoryEntry::Restored { sequence, .. }
            | HistoryEntry::Transition { sequence, .. } => *sequence,
        }
    }
}

/// Outcome of `handle_action`, shaped for the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub new_state: Option<GameState>,
    /// Stable error code when `success` is false
    pub error_code: Option<String>,
}

impl ActionResult {
    pub fn accepted(message: String, state: GameState) -> Self {
        Self {
            success: true,
            message,
            new_state: Some(state),
            error_code: None,
        }
    }

    pub fn rejected(error: &GameError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            new_state: None,
            error_code: Some(error.code().to_string()),
        }
    }
}
