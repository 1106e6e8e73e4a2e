//! Go on a 19×19 board.
//!
//! Captures use a flood fill over groups and their liberties. Suicide and
//! simple ko (recreating the position from before the opponent's last move)
//! are rejected. Two consecutive passes end the game and area scoring with
//! komi decides it.

use super::Stone;
use crate::actions::PlayerAction;
use crate::engine::{Applied, PlayerCount, RuleEngine};
use crate::game::{BoardState, GameError, GameType};
use crate::grid::{Coord, Grid};
use crate::player::{Player, PlayerColor};
use crate::rng::GameRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const BOARD_SIZE: usize = 19;
pub const KOMI: f32 = 6.5;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum GoAction {
    Place { x: usize, y: usize },
    Pass,
    Resign,
}

/// Stones taken by each side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captures {
    pub black: u32,
    pub white: u32,
}

/// Final area score, komi included for white
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoScore {
    pub black: f32,
    pub white: f32,
}

impl GoScore {
    pub fn leader(&self) -> Stone {
        if self.black > self.white {
            Stone::Black
        } else {
            Stone::White
        }
    }
}

/// Board payload of a Go snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoBoard {
    pub grid: Grid<Stone>,
    pub to_move: Stone,
    pub captures: Captures,
    pub consecutive_passes: u8,
    pub komi: f32,
    pub score: Option<GoScore>,
}

#[derive(Debug, Clone)]
pub struct Go {
    board: Grid<Stone>,
    to_move: Stone,
    captures: Captures,
    consecutive_passes: u8,
    /// Position before the last placement, for ko
    previous: Option<Grid<Stone>>,
    score: Option<GoScore>,
    resigned: Option<Stone>,
}

impl Default for Go {
    fn default() -> Self {
        Self {
            board: Grid::new(BOARD_SIZE, BOARD_SIZE),
            to_move: Stone::Black,
            captures: Captures::default(),
            consecutive_passes: 0,
            previous: None,
            score: None,
            resigned: None,
        }
    }
}

/// The group containing `pos` and the set of its liberties
fn group_at(board: &Grid<Stone>, pos: Coord) -> (Vec<Coord>, HashSet<Coord>) {
    let mut group = Vec::new();
    let mut liberties = HashSet::new();
    let Some(&color) = board.get(pos) else {
        return (group, liberties);
    };

    let mut seen = HashSet::from([pos]);
    let mut stack = vec![pos];
    while let Some(current) = stack.pop() {
        group.push(current);
        for next in board.neighbors(current) {
            match board.get(next) {
                None => {
                    liberties.insert(next);
                }
                Some(&stone) if stone == color && seen.insert(next) => stack.push(next),
                Some(_) => {}
            }
        }
    }
    (group, liberties)
}

impl Go {
    pub fn stone_at(&self, pos: Coord) -> Option<Stone> {
        self.board.get(pos).copied()
    }

    pub fn captures(&self) -> Captures {
        self.captures
    }

    /// Play `stone` at `pos` on a copy of the board.
    ///
    /// Returns the resulting position and the number of stones captured.
    fn try_place(&self, pos: Coord, stone: Stone) -> Result<(Grid<Stone>, u32), GameError> {
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

        let mut next = self.board.clone();
        next.set(pos, Some(stone));

        let mut captured = 0;
        let neighbors: Vec<Coord> = next.neighbors(pos).collect();
        for adjacent in neighbors {
            if next.get(adjacent) != Some(&stone.opponent()) {
                continue;
            }
            let (group, liberties) = group_at(&next, adjacent);
            if liberties.is_empty() {
                for taken in &group {
                    next.set(*taken, None);
                }
                captured += group.len() as u32;
            }
        }

        let (_, liberties) = group_at(&next, pos);
        if liberties.is_empty() {
            return Err(GameError::InvalidMove("suicide is not allowed".into()));
        }
        if self.previous.as_ref() == Some(&next) {
            return Err(GameError::InvalidMove("ko: position repeats".into()));
        }
        Ok((next, captured))
    }

    pub fn validate_move(&self, pos: Coord, stone: Stone) -> Result<(), GameError> {
        self.try_place(pos, stone).map(|_| ())
    }

    /// Place a stone, removing any opponent groups left without liberties
    pub fn apply_move(&mut self, pos: Coord, stone: Stone) -> Result<u32, GameError> {
        let (next, captured) = self.try_place(pos, stone)?;
        self.previous = Some(std::mem::replace(&mut self.board, next));
        match stone {
            Stone::Black => self.captures.black += captured,
            Stone::White => self.captures.white += captured,
        }
        self.consecutive_passes = 0;
        self.to_move = stone.opponent();
        Ok(captured)
    }

    pub fn pass(&mut self) {
        self.consecutive_passes += 1;
        self.previous = None;
        self.to_move = self.to_move.opponent();
        if self.consecutive_passes >= 2 {
            self.score = Some(self.calculate_score());
        }
    }

    /// Area score: stones on the board plus empty regions bordered by one color
    pub fn calculate_score(&self) -> GoScore {
        let mut black = 0usize;
        let mut white = 0usize;
        let mut visited = HashSet::new();

        for pos in self.board.coords() {
            match self.board.get(pos) {
                Some(Stone::Black) => black += 1,
                Some(Stone::White) => white += 1,
                None if !visited.contains(&pos) => {
                    let (size, borders) = self.empty_region(pos, &mut visited);
                    match (borders.contains(&Stone::Black), borders.contains(&Stone::White)) {
                        (true, false) => black += size,
                        (false, true) => white += size,
                        _ => {}
                    }
                }
                None => {}
            }
        }

        GoScore {
            black: black as f32,
            white: white as f32 + KOMI,
        }
    }

    fn empty_region(&self, start: Coord, visited: &mut HashSet<Coord>) -> (usize, HashSet<Stone>) {
        let mut size = 0;
        let mut borders = HashSet::new();
        let mut stack = vec![start];
        visited.insert(start);
        while let Some(current) = stack.pop() {
            size += 1;
            for next in self.board.neighbors(current) {
                match self.board.get(next) {
                    Some(&stone) => {
                        borders.insert(stone);
                    }
                    None => {
                        if visited.insert(next) {
                            stack.push(next);
                        }
                    }
                }
            }
        }
        (size, borders)
    }
}

impl RuleEngine for Go {
    const GAME_TYPE: GameType = GameType::Go;

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

    fn validate_action(&self, seat: usize, action: &PlayerAction) -> Result<(), GameError> {
        match action.decode::<GoAction>()? {
            GoAction::Place { x, y } => self.validate_move((x, y), Stone::for_seat(seat)),
            GoAction::Pass | GoAction::Resign => Ok(()),
        }
    }

    fn apply_action(&mut self, seat: usize, action: &PlayerAction) -> Result<Applied, GameError> {
        match action.decode::<GoAction>()? {
            GoAction::Place { x, y } => {
                let captured = self.apply_move((x, y), Stone::for_seat(seat))?;
                let applied = Applied::next_turn();
                Ok(if captured > 0 {
                    applied.with_message(format!("Captured {captured} stones"))
                } else {
                    applied
                })
            }
            GoAction::Pass => {
                self.pass();
                Ok(Applied::next_turn())
            }
            GoAction::Resign => {
                self.resigned = Some(Stone::for_seat(seat));
                Ok(Applied::same_turn().with_message("Resigned"))
            }
        }
    }

    fn board(&self) -> BoardState {
        BoardState::Go(GoBoard {
            grid: self.board.clone(),
            to_move: self.to_move,
            captures: self.captures,
            consecutive_passes: self.consecutive_passes,
            komi: KOMI,
            score: self.score,
        })
    }

    fn is_game_over(&self) -> bool {
        self.resigned.is_some() || self.score.is_some()
    }

    fn winner(&self) -> Option<usize> {
        if let Some(resigned) = self.resigned {
            return Some(resigned.opponent().seat());
        }
        self.score.map(|score| score.leader().seat())
    }

    fn is_healthy(&self) -> bool {
        self.board.has_shape(BOARD_SIZE, BOARD_SIZE)
    }
}
