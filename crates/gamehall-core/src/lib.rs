//! Gamehall - rule engines for a multi-game board and card server
//!
//! This crate provides the game logic behind the Gamehall server:
//! - A shared match data model (`GameState`, `PlayerAction`, history)
//! - The `RuleEngine` contract and the generic `Game<E>` that handles
//!   roster, turns, history and checkpoints for every game
//! - Seven concrete engines: five-in-a-row, chess, Chinese chess, Go,
//!   a poker-like card game, werewolf and mahjong
//! - `AnyGame`, which lets a transport drive any of them uniformly
//!
//! # Architecture
//!
//! Engines are plain `Clone` values with no I/O. All randomness comes from
//! a per-match [`GameRng`], so a seeded match replays identically.
//!
//! # Modules
//!
//! - [`engine`]: `RuleEngine` and `Game<E>`
//! - [`games`]: the concrete engines
//! - [`any`]: type-erased dispatch over all engines
//! - [`game`]: `GameType`, `GameState`, `GameError`
//! - [`actions`]: `PlayerAction`, `HistoryEntry`, `ActionResult`
//! - [`player`]: player identity and seating
//! - [`grid`]: fixed-size boards
//! - [`rng`]: seedable randomness

pub mod actions;
pub mod any;
pub mod engine;
pub mod game;
pub mod games;
pub mod grid;
pub mod player;
pub mod rng;

// Re-export commonly used types
pub use actions::{ActionResult, HistoryEntry, PlayerAction};
pub use any::AnyGame;
pub use engine::{Applied, Game, PlayerCount, RuleEngine, TurnPolicy, MAX_CHECKPOINTS};
pub use game::{
    BoardState, GameError, GameState, GameType, MatchStatus, PrivateView, UnsupportedGameType,
    HISTORY_WINDOW,
};
pub use grid::{Coord, Grid};
pub use player::{Player, PlayerColor, PlayerId};
pub use rng::GameRng;
