//! Players seated at a game.
//!
//! This module contains:
//! - `PlayerId`, the opaque identifier the transport assigns
//! - `Player`, a seated player with display name, seat and color
//! - `PlayerColor` for the two-sided board games

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque player identifier, unique within a match
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Side colors used by the two-player board games
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerColor {
    White,
    Black,
    Red,
}

impl fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerColor::White => "white",
            PlayerColor::Black => "black",
            PlayerColor::Red => "red",
        };
        f.write_str(name)
    }
}

/// A player seated in a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Transport-assigned identifier
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Seat index, equal to the position in the roster
    pub seat: usize,
    /// Side color for board games, `None` for card and party games
    pub color: Option<PlayerColor>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, seat: usize, color: Option<PlayerColor>) -> Self {
        Self {
            id,
            name,
            seat,
            color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let id = PlayerId::new("alice");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");
        let back: PlayerId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(back, id);
    }
}
