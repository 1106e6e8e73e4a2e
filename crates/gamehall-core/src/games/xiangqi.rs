//! Chinese chess (xiangqi) on a 10×9 board.
//!
//! Like [`chess`](super::chess), moves are checked for structure only.
//! River and palace geometry is available to callers but not enforced.

use super::{check_piece_move, PieceMove};
use crate::actions::PlayerAction;
use crate::engine::{Applied, PlayerCount, RuleEngine};
use crate::game::{BoardState, GameError, GameType};
use crate::grid::{Coord, Grid};
use crate::player::{Player, PlayerColor};
use crate::rng::GameRng;
use serde::{Deserialize, Serialize};

pub const ROWS: usize = 10;
pub const COLS: usize = 9;

/// Last row on black's side of the river
pub const RIVER_ROW: usize = 4;

/// Red moves first and sits at the bottom (rows 5..=9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XiangqiSide {
    Red,
    Black,
}

impl XiangqiSide {
    fn for_seat(seat: usize) -> Self {
        if seat == 0 {
            XiangqiSide::Red
        } else {
            XiangqiSide::Black
        }
    }

    fn seat(&self) -> usize {
        match self {
            XiangqiSide::Red => 0,
            XiangqiSide::Black => 1,
        }
    }

    fn flip(&self) -> Self {
        match self {
            XiangqiSide::Red => XiangqiSide::Black,
            XiangqiSide::Black => XiangqiSide::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XiangqiKind {
    General,
    Advisor,
    Elephant,
    Horse,
    Chariot,
    Cannon,
    Soldier,
}

/// A xiangqi piece, serialized as its WXF letter (uppercase red)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "char", try_from = "char")]
pub struct XiangqiPiece {
    pub side: XiangqiSide,
    pub kind: XiangqiKind,
}

impl XiangqiPiece {
    pub fn new(side: XiangqiSide, kind: XiangqiKind) -> Self {
        Self { side, kind }
    }
}

impl From<XiangqiPiece> for char {
    fn from(piece: XiangqiPiece) -> char {
        let letter = match piece.kind {
            XiangqiKind::General => 'k',
            XiangqiKind::Advisor => 'a',
            XiangqiKind::Elephant => 'e',
            XiangqiKind::Horse => 'h',
            XiangqiKind::Chariot => 'r',
            XiangqiKind::Cannon => 'c',
            XiangqiKind::Soldier => 'p',
        };
        match piece.side {
            XiangqiSide::Red => letter.to_ascii_uppercase(),
            XiangqiSide::Black => letter,
        }
    }
}

impl TryFrom<char> for XiangqiPiece {
    type Error = String;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        let kind = match c.to_ascii_lowercase() {
            'k' => XiangqiKind::General,
            'a' => XiangqiKind::Advisor,
            'e' => XiangqiKind::Elephant,
            'h' => XiangqiKind::Horse,
            'r' => XiangqiKind::Chariot,
            'c' => XiangqiKind::Cannon,
            'p' => XiangqiKind::Soldier,
            _ => return Err(format!("unknown xiangqi piece {c:?}")),
        };
        let side = if c.is_ascii_uppercase() {
            XiangqiSide::Red
        } else {
            XiangqiSide::Black
        };
        Ok(Self { side, kind })
    }
}

/// Whether `pos` lies in the 3×3 palace of `side`
pub fn in_palace(side: XiangqiSide, (row, col): Coord) -> bool {
    let rows = match side {
        XiangqiSide::Black => 0..=2,
        XiangqiSide::Red => 7..=9,
    };
    rows.contains(&row) && (3..=5).contains(&col)
}

/// Whether `pos` is on the opponent's side of the river for `side`
pub fn crossed_river(side: XiangqiSide, (row, _): Coord) -> bool {
    match side {
        XiangqiSide::Red => row <= RIVER_ROW,
        XiangqiSide::Black => row > RIVER_ROW,
    }
}

/// Board payload of a Chinese chess snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XiangqiBoard {
    pub grid: Grid<XiangqiPiece>,
    pub side_to_move: XiangqiSide,
    pub move_count: u32,
    pub captured: Vec<XiangqiPiece>,
}

#[derive(Debug, Clone)]
pub struct Xiangqi {
    board: Grid<XiangqiPiece>,
    side_to_move: XiangqiSide,
    move_count: u32,
    captured: Vec<XiangqiPiece>,
    resigned: Option<XiangqiSide>,
}

impl Default for Xiangqi {
    fn default() -> Self {
        Self {
            board: initial_board(),
            side_to_move: XiangqiSide::Red,
            move_count: 0,
            captured: Vec::new(),
            resigned: None,
        }
    }
}

fn initial_board() -> Grid<XiangqiPiece> {
    let row = |layout: &str| -> Vec<Option<XiangqiPiece>> {
        layout
            .chars()
            .map(|c| XiangqiPiece::try_from(c).ok())
            .collect()
    };
    Grid::from_rows(vec![
        row("rheakaehr"),
        row("........."),
        row(".c.....c."),
        row("p.p.p.p.p"),
        row("........."),
        row("........."),
        row("P.P.P.P.P"),
        row(".C.....C."),
        row("........."),
        row("RHEAKAEHR"),
    ])
}

impl Xiangqi {
    pub fn piece_at(&self, pos: Coord) -> Option<XiangqiPiece> {
        self.board.get(pos).copied()
    }

    pub fn side_to_move(&self) -> XiangqiSide {
        self.side_to_move
    }

    pub fn validate_move(&self, from: Coord, to: Coord) -> Result<(), GameError> {
        check_piece_move(&self.board, from, to)
    }

    pub fn apply_move(&mut self, from: Coord, to: Coord) -> Result<(), GameError> {
        self.validate_move(from, to)?;
        let Some(piece) = self.board.set(from, None) else {
            return Err(GameError::InvalidMove("no piece to move".into()));
        };
        if let Some(captured) = self.board.set(to, Some(piece)) {
            self.captured.push(captured);
        }
        self.move_count += 1;
        self.side_to_move = self.side_to_move.flip();
        Ok(())
    }
}

impl RuleEngine for Xiangqi {
    const GAME_TYPE: GameType = GameType::ChineseChess;

    fn player_count() -> PlayerCount {
        PlayerCount::exactly(2)
    }

    fn color_for_seat(seat: usize) -> Option<PlayerColor> {
        Some(match XiangqiSide::for_seat(seat) {
            XiangqiSide::Red => PlayerColor::Red,
            XiangqiSide::Black => PlayerColor::Black,
        })
    }

    fn start(&mut self, _players: &[Player], _rng: &mut GameRng) -> Result<(), GameError> {
        *self = Self::default();
        Ok(())
    }

    fn validate_action(&self, _seat: usize, action: &PlayerAction) -> Result<(), GameError> {
        match action.decode::<PieceMove>()? {
            PieceMove::Move { from, to } => self.validate_move(from, to),
            PieceMove::Resign => Ok(()),
        }
    }

    fn apply_action(&mut self, seat: usize, action: &PlayerAction) -> Result<Applied, GameError> {
        match action.decode::<PieceMove>()? {
            PieceMove::Move { from, to } => {
                self.apply_move(from, to)?;
                Ok(Applied::next_turn())
            }
            PieceMove::Resign => {
                self.resigned = Some(XiangqiSide::for_seat(seat));
                Ok(Applied::same_turn().with_message("Resigned"))
            }
        }
    }

    fn board(&self) -> BoardState {
        BoardState::ChineseChess(XiangqiBoard {
            grid: self.board.clone(),
            side_to_move: self.side_to_move,
            move_count: self.move_count,
            captured: self.captured.clone(),
        })
    }

    fn is_game_over(&self) -> bool {
        self.resigned.is_some()
    }

    fn winner(&self) -> Option<usize> {
        self.resigned.map(|side| side.flip().seat())
    }

    fn is_healthy(&self) -> bool {
        self.board.has_shape(ROWS, COLS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_layout() {
        let game = Xiangqi::default();
        assert_eq!(
            game.piece_at((9, 4)),
            Some(XiangqiPiece::new(XiangqiSide::Red, XiangqiKind::General))
        );
        assert_eq!(
            game.piece_at((2, 1)),
            Some(XiangqiPiece::new(XiangqiSide::Black, XiangqiKind::Cannon))
        );
        assert_eq!(game.piece_at((4, 4)), None);
        assert!(game.board.has_shape(ROWS, COLS));
    }

    #[test]
    fn test_geometry_helpers() {
        assert!(in_palace(XiangqiSide::Red, (9, 4)));
        assert!(in_palace(XiangqiSide::Black, (0, 3)));
        assert!(!in_palace(XiangqiSide::Red, (0, 4)));
        assert!(!in_palace(XiangqiSide::Black, (1, 6)));
        assert!(crossed_river(XiangqiSide::Red, (4, 0)));
        assert!(!crossed_river(XiangqiSide::Red, (5, 0)));
        assert!(crossed_river(XiangqiSide::Black, (5, 0)));
    }

    #[test]
    fn test_moves_alternate_and_capture() {
        let mut game = Xiangqi::default();
        assert!(game.validate_move((5, 0), (4, 0)).is_err());

        game.apply_move((7, 1), (0, 1)).unwrap();
        assert_eq!(game.side_to_move(), XiangqiSide::Black);
        assert_eq!(
            game.captured,
            vec![XiangqiPiece::new(XiangqiSide::Black, XiangqiKind::Horse)]
        );
        game.apply_move((3, 0), (4, 0)).unwrap();
        assert_eq!(game.side_to_move(), XiangqiSide::Red);
        assert_eq!(game.move_count, 2);
    }
}
