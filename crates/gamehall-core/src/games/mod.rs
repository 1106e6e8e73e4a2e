//! Concrete rule engines, one per [`GameType`](crate::GameType).

pub mod chess;
pub mod go;
pub mod gomoku;
pub mod mahjong;
pub mod poker;
pub mod werewolf;
pub mod xiangqi;

use crate::game::GameError;
use crate::grid::{Coord, Grid};
use crate::player::PlayerColor;
use serde::{Deserialize, Serialize};

/// Stone colors; black moves first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stone {
    Black,
    White,
}

impl Stone {
    pub fn for_seat(seat: usize) -> Self {
        if seat == 0 {
            Stone::Black
        } else {
            Stone::White
        }
    }

    pub fn seat(&self) -> usize {
        match self {
            Stone::Black => 0,
            Stone::White => 1,
        }
    }

    pub fn opponent(&self) -> Self {
        match self {
            Stone::Black => Stone::White,
            Stone::White => Stone::Black,
        }
    }

    pub fn color(&self) -> PlayerColor {
        match self {
            Stone::Black => PlayerColor::Black,
            Stone::White => PlayerColor::White,
        }
    }
}

/// Actions shared by the two chess variants
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum PieceMove {
    Move { from: Coord, to: Coord },
    Resign,
}

/// Structural checks for a piece move: both squares on the board, distinct,
/// and a piece on the source square. Piece-specific legality is not checked.
pub(crate) fn check_piece_move<T>(board: &Grid<T>, from: Coord, to: Coord) -> Result<(), GameError> {
    if !board.in_bounds(from) || !board.in_bounds(to) {
        return Err(GameError::InvalidMove("square is off the board".into()));
    }
    if from == to {
        return Err(GameError::InvalidMove("source and destination are the same".into()));
    }
    if board.get(from).is_none() {
        return Err(GameError::InvalidMove(format!(
            "no piece at ({}, {})",
            from.0, from.1
        )));
    }
    Ok(())
}
