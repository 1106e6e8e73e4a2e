//! Five-in-a-row on a 15×15 board.

use super::Stone;
use crate::actions::PlayerAction;
use crate::engine::{Applied, PlayerCount, RuleEngine};
use crate::game::{BoardState, GameError, GameType};
use crate::grid::{Coord, Grid};
use crate::player::{Player, PlayerColor};
use crate::rng::GameRng;
use serde::{Deserialize, Serialize};

pub const BOARD_SIZE: usize = 15;
pub const WIN_LENGTH: usize = 5;

/// Horizontal, vertical, diagonal, anti-diagonal
const AXES: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum GomokuAction {
    Place { x: usize, y: usize },
}

/// Board payload of a five-in-a-row snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GomokuBoard {
    pub grid: Grid<Stone>,
    pub last_move: Option<Coord>,
    pub winner: Option<Stone>,
}

#[derive(Debug, Clone)]
pub struct Gomoku {
    board: Grid<Stone>,
    last_move: Option<Coord>,
    winner: Option<Stone>,
}

impl Default for Gomoku {
    fn default() -> Self {
        Self {
            board: Grid::new(BOARD_SIZE, BOARD_SIZE),
            last_move: None,
            winner: None,
        }
    }
}

impl Gomoku {
    pub fn stone_at(&self, pos: Coord) -> Option<Stone> {
        self.board.get(pos).copied()
    }

    /// Coordinate in bounds and the cell empty
    pub fn validate_move(&self, pos: Coord) -> Result<(), GameError> {
        if !self.board.in_bounds(pos) {
            return Err(GameError::InvalidMove(format!(
                "({}, {}) is off the board",
                pos.0, pos.1
            )));
        }
        if self.board.get(pos).is_some() {
            return Err(GameError::InvalidMove(format!(
                "({}, {}) is occupied",
                pos.0, pos.1
            )));
        }
        Ok(())
    }

    /// Place a stone and record a win if it completes a line
    pub fn apply_move(&mut self, pos: Coord, stone: Stone) -> Result<(), GameError> {
        self.validate_move(pos)?;
        self.board.set(pos, Some(stone));
        self.last_move = Some(pos);
        if self.check_win(pos, stone) {
            self.winner = Some(stone);
        }
        Ok(())
    }

    /// Whether the stone at `pos` is part of a line of at least five.
    ///
    /// Each axis counts outwards in both directions from `pos`, which is
    /// itself counted once; the first axis reaching five wins.
    pub fn check_win(&self, pos: Coord, stone: Stone) -> bool {
        AXES.iter().any(|&(dr, dc)| {
            let forward = self.run_length(pos, stone, dr, dc);
            let backward = self.run_length(pos, stone, -dr, -dc);
            1 + forward + backward >= WIN_LENGTH
        })
    }

    fn run_length(&self, from: Coord, stone: Stone, dr: isize, dc: isize) -> usize {
        let mut count = 0;
        let mut cursor = self.board.offset(from, dr, dc);
        while let Some(pos) = cursor {
            if self.board.get(pos) != Some(&stone) {
                break;
            }
            count += 1;
            cursor = self.board.offset(pos, dr, dc);
        }
        count
    }
}

impl RuleEngine for Gomoku {
    const GAME_TYPE: GameType = GameType::Gomoku;

    fn player_count() -> PlayerCount {
        PlayerCount::exactly(2)
    }

    fn color_for_seat(seat: usize) -> Option<PlayerColor> {
        Some(Stone::for_seat(seat).color())
    }

    fn start(&mut self, _players: &[Player], _rng: &mut GameRng) -> Result<(), GameError> {
        *self = Self::default();
        Ok(())
    }

    fn validate_action(&self, _seat: usize, action: &PlayerAction) -> Result<(), GameError> {
        let GomokuAction::Place { x, y } = action.decode::<GomokuAction>()?;
        self.validate_move((x, y))
    }

    fn apply_action(&mut self, seat: usize, action: &PlayerAction) -> Result<Applied, GameError> {
        let GomokuAction::Place { x, y } = action.decode::<GomokuAction>()?;
        self.apply_move((x, y), Stone::for_seat(seat))?;
        Ok(Applied::next_turn())
    }

    fn board(&self) -> BoardState {
        BoardState::Gomoku(GomokuBoard {
            grid: self.board.clone(),
            last_move: self.last_move,
            winner: self.winner,
        })
    }

    fn is_game_over(&self) -> bool {
        self.winner.is_some() || self.board.is_full()
    }

    fn winner(&self) -> Option<usize> {
        self.winner.map(|stone| stone.seat())
    }

    fn is_healthy(&self) -> bool {
        self.board.has_shape(BOARD_SIZE, BOARD_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_in_a_column_wins() {
        let mut game = Gomoku::default();
        for row in 5..9 {
            game.apply_move((row, 7), Stone::Black).unwrap();
        }
        assert!(!game.check_win((8, 7), Stone::Black));
        assert!(game.winner.is_none());

        game.apply_move((9, 7), Stone::Black).unwrap();
        assert!(game.check_win((9, 7), Stone::Black));
        assert_eq!(game.winner, Some(Stone::Black));
    }

    #[test]
    fn test_win_counted_from_the_middle() {
        let mut game = Gomoku::default();
        for col in [3, 4, 6, 7] {
            game.apply_move((2, col), Stone::White).unwrap();
        }
        assert!(game.winner.is_none());
        game.apply_move((2, 5), Stone::White).unwrap();
        assert_eq!(game.winner, Some(Stone::White));
    }

    #[test]
    fn test_diagonals_and_edges() {
        let mut game = Gomoku::default();
        for i in 0..5 {
            game.apply_move((i, i), Stone::Black).unwrap();
        }
        assert_eq!(game.winner, Some(Stone::Black));

        let mut game = Gomoku::default();
        for i in 0..5 {
            game.apply_move((10 + i, 14 - i), Stone::White).unwrap();
        }
        assert_eq!(game.winner, Some(Stone::White));
    }

    #[test]
    fn test_mixed_colors_break_the_run() {
        let mut game = Gomoku::default();
        for col in 0..4 {
            game.apply_move((0, col), Stone::Black).unwrap();
        }
        game.apply_move((0, 4), Stone::White).unwrap();
        game.apply_move((0, 5), Stone::Black).unwrap();
        assert!(game.winner.is_none());
    }

    #[test]
    fn test_out_of_bounds_and_occupied() {
        let mut game = Gomoku::default();
        assert!(game.validate_move((15, 0)).is_err());
        assert!(game.validate_move((0, 15)).is_err());
        game.apply_move((3, 3), Stone::Black).unwrap();
        let before = game.board.clone();
        assert!(game.apply_move((3, 3), Stone::White).is_err());
        assert_eq!(game.board, before);
        assert_eq!(game.stone_at((3, 3)), Some(Stone::Black));
    }
}
