//! International chess.
//!
//! Only the structure of a move is validated: both squares on the board and
//! a piece on the source square. Piece movement, check, castling, en
//! passant captures and promotion are not enforced. The engine does keep the
//! bookkeeping a full implementation would need (castling rights, en
//! passant target, move clocks) and records captured pieces.

use super::{check_piece_move, PieceMove};
use crate::actions::PlayerAction;
use crate::engine::{Applied, PlayerCount, RuleEngine};
use crate::game::{BoardState, GameError, GameType};
use crate::grid::{Coord, Grid};
use crate::player::{Player, PlayerColor};
use crate::rng::GameRng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BOARD_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    White,
    Black,
}

impl Side {
    fn for_seat(seat: usize) -> Self {
        if seat == 0 {
            Side::White
        } else {
            Side::Black
        }
    }

    fn seat(&self) -> usize {
        match self {
            Side::White => 0,
            Side::Black => 1,
        }
    }

    fn flip(&self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Row of this side's back rank
    fn home_row(&self) -> usize {
        match self {
            Side::White => 7,
            Side::Black => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// A chess piece, serialized as its FEN letter (uppercase white)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "char", try_from = "char")]
pub struct ChessPiece {
    pub side: Side,
    pub kind: PieceKind,
}

impl ChessPiece {
    pub fn new(side: Side, kind: PieceKind) -> Self {
        Self { side, kind }
    }
}

impl From<ChessPiece> for char {
    fn from(piece: ChessPiece) -> char {
        let letter = match piece.kind {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match piece.side {
            Side::White => letter.to_ascii_uppercase(),
            Side::Black => letter,
        }
    }
}

impl TryFrom<char> for ChessPiece {
    type Error = String;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        let kind = match c.to_ascii_lowercase() {
            'p' => PieceKind::Pawn,
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            'k' => PieceKind::King,
            _ => return Err(format!("unknown chess piece {c:?}")),
        };
        let side = if c.is_ascii_uppercase() {
            Side::White
        } else {
            Side::Black
        };
        Ok(Self { side, kind })
    }
}

impl fmt::Display for ChessPiece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl Default for CastlingRights {
    fn default() -> Self {
        Self {
            white_king_side: true,
            white_queen_side: true,
            black_king_side: true,
            black_queen_side: true,
        }
    }
}

impl CastlingRights {
    fn clear(&mut self, side: Side) {
        match side {
            Side::White => {
                self.white_king_side = false;
                self.white_queen_side = false;
            }
            Side::Black => {
                self.black_king_side = false;
                self.black_queen_side = false;
            }
        }
    }

    /// A rook left or was captured on one of the corner squares
    fn touch_corner(&mut self, pos: Coord) {
        match pos {
            (7, 0) => self.white_queen_side = false,
            (7, 7) => self.white_king_side = false,
            (0, 0) => self.black_queen_side = false,
            (0, 7) => self.black_king_side = false,
            _ => {}
        }
    }
}

/// Board payload of a chess snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChessBoard {
    pub grid: Grid<ChessPiece>,
    pub side_to_move: Side,
    pub castling: CastlingRights,
    pub en_passant_target: Option<Coord>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
    pub captured: Vec<ChessPiece>,
}

#[derive(Debug, Clone)]
pub struct Chess {
    board: Grid<ChessPiece>,
    side_to_move: Side,
    castling: CastlingRights,
    en_passant_target: Option<Coord>,
    halfmove_clock: u32,
    fullmove_number: u32,
    captured: Vec<ChessPiece>,
    resigned: Option<Side>,
}

impl Default for Chess {
    fn default() -> Self {
        Self {
            board: initial_board(),
            side_to_move: Side::White,
            castling: CastlingRights::default(),
            en_passant_target: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            captured: Vec::new(),
            resigned: None,
        }
    }
}

fn initial_board() -> Grid<ChessPiece> {
    const BACK_RANK: &str = "rnbqkbnr";
    let rank = |letters: &str, side: Side| -> Vec<Option<ChessPiece>> {
        letters
            .chars()
            .map(|c| {
                let c = match side {
                    Side::White => c.to_ascii_uppercase(),
                    Side::Black => c,
                };
                ChessPiece::try_from(c).ok()
            })
            .collect()
    };
    let empty = || vec![None; BOARD_SIZE];

    Grid::from_rows(vec![
        rank(BACK_RANK, Side::Black),
        rank("pppppppp", Side::Black),
        empty(),
        empty(),
        empty(),
        empty(),
        rank("pppppppp", Side::White),
        rank(BACK_RANK, Side::White),
    ])
}

impl Chess {
    pub fn piece_at(&self, pos: Coord) -> Option<ChessPiece> {
        self.board.get(pos).copied()
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    pub fn validate_move(&self, from: Coord, to: Coord) -> Result<(), GameError> {
        check_piece_move(&self.board, from, to)
    }

    /// Move a piece and switch sides
    pub fn apply_move(&mut self, from: Coord, to: Coord) -> Result<(), GameError> {
        self.validate_move(from, to)?;
        let Some(piece) = self.board.set(from, None) else {
            return Err(GameError::InvalidMove("no piece to move".into()));
        };
        let captured = self.board.set(to, Some(piece));

        if piece.kind == PieceKind::King && from == (piece.side.home_row(), 4) {
            self.castling.clear(piece.side);
        }
        self.castling.touch_corner(from);
        self.castling.touch_corner(to);

        self.en_passant_target = (piece.kind == PieceKind::Pawn && from.0.abs_diff(to.0) == 2)
            .then(|| ((from.0 + to.0) / 2, from.1));

        if piece.kind == PieceKind::Pawn || captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if self.side_to_move == Side::Black {
            self.fullmove_number += 1;
        }
        if let Some(captured) = captured {
            self.captured.push(captured);
        }

        self.side_to_move = self.side_to_move.flip();
        Ok(())
    }
}

impl RuleEngine for Chess {
    const GAME_TYPE: GameType = GameType::Chess;

    fn player_count() -> PlayerCount {
        PlayerCount::exactly(2)
    }

    fn color_for_seat(seat: usize) -> Option<PlayerColor> {
        Some(match Side::for_seat(seat) {
            Side::White => PlayerColor::White,
            Side::Black => PlayerColor::Black,
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
                self.resigned = Some(Side::for_seat(seat));
                Ok(Applied::same_turn().with_message("Resigned"))
            }
        }
    }

    fn board(&self) -> BoardState {
        BoardState::Chess(ChessBoard {
            grid: self.board.clone(),
            side_to_move: self.side_to_move,
            castling: self.castling,
            en_passant_target: self.en_passant_target,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
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
        self.board.has_shape(BOARD_SIZE, BOARD_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_position() {
        let game = Chess::default();
        assert_eq!(
            game.piece_at((7, 4)),
            Some(ChessPiece::new(Side::White, PieceKind::King))
        );
        assert_eq!(
            game.piece_at((0, 3)),
            Some(ChessPiece::new(Side::Black, PieceKind::Queen))
        );
        assert_eq!(game.piece_at((4, 4)), None);
        assert_eq!(game.side_to_move(), Side::White);
    }

    #[test]
    fn test_piece_serializes_as_fen_letter() {
        let knight = ChessPiece::new(Side::White, PieceKind::Knight);
        assert_eq!(serde_json::to_string(&knight).unwrap(), "\"N\"");
        let back: ChessPiece = serde_json::from_str("\"q\"").unwrap();
        assert_eq!(back, ChessPiece::new(Side::Black, PieceKind::Queen));
        assert!(serde_json::from_str::<ChessPiece>("\"x\"").is_err());
    }

    #[test]
    fn test_empty_source_rejected() {
        let game = Chess::default();
        assert!(game.validate_move((4, 4), (3, 4)).is_err());
        assert!(game.validate_move((6, 4), (8, 4)).is_err());
        assert!(game.validate_move((6, 4), (6, 4)).is_err());
        assert!(game.validate_move((6, 4), (4, 4)).is_ok());
    }

    #[test]
    fn test_move_bookkeeping() {
        let mut game = Chess::default();
        game.apply_move((6, 4), (4, 4)).unwrap();
        assert_eq!(game.en_passant_target, Some((5, 4)));
        assert_eq!(game.side_to_move(), Side::Black);
        assert_eq!(game.fullmove_number, 1);

        game.apply_move((0, 6), (2, 5)).unwrap();
        assert_eq!(game.en_passant_target, None);
        assert_eq!(game.halfmove_clock, 1);
        assert_eq!(game.fullmove_number, 2);

        game.apply_move((7, 4), (6, 4)).unwrap();
        assert!(!game.castling.white_king_side);
        assert!(!game.castling.white_queen_side);
        assert!(game.castling.black_king_side);
    }

    #[test]
    fn test_capture_recorded() {
        let mut game = Chess::default();
        game.apply_move((7, 0), (0, 0)).unwrap();
        assert_eq!(
            game.captured,
            vec![ChessPiece::new(Side::Black, PieceKind::Rook)]
        );
        assert!(!game.castling.white_queen_side);
        assert!(!game.castling.black_queen_side);
        assert_eq!(game.halfmove_clock, 0);
    }
}
