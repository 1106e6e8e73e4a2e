//! The rule-engine contract and the match bookkeeping shared by every game.
//!
//! A concrete game implements [`RuleEngine`]: it owns its board, validates
//! and applies decoded actions, and reports game over / winner. [`Game`]
//! wraps an engine with everything that is the same for all games: the
//! roster, the turn indicator, the WaitingForPlayers → InProgress →
//! Finished state machine, the append-only history and checkpoints for
//! undo and replay.

use crate::actions::{ActionResult, HistoryEntry, PlayerAction};
use crate::game::{
    BoardState, GameError, GameState, GameType, MatchStatus, PrivateView, HISTORY_WINDOW,
};
use crate::player::{Player, PlayerColor, PlayerId};
use crate::rng::GameRng;
use std::collections::VecDeque;
use tracing::{debug, warn};
use uuid::Uuid;

/// Checkpoints kept for undo; older ones are dropped
pub const MAX_CHECKPOINTS: usize = 64;

/// Seats a game accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerCount {
    pub min: usize,
    pub max: usize,
}

impl PlayerCount {
    pub const fn exactly(n: usize) -> Self {
        Self { min: n, max: n }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, n: usize) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

/// Who may act while a match is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPolicy {
    /// Only the current player may act; accepted actions move the turn on
    RoundRobin,
    /// Any seated, active player may act; the turn indicator does not move
    Simultaneous,
}

/// What an accepted action did to the turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Move the turn to the next active seat
    pub advance_turn: bool,
    /// Human-readable note for the acting player
    pub message: Option<String>,
}

impl Applied {
    pub fn next_turn() -> Self {
        Self {
            advance_turn: true,
            message: None,
        }
    }

    pub fn same_turn() -> Self {
        Self {
            advance_turn: false,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Rules of a single game type.
///
/// `validate_action` must be free of side effects. `apply_action` is only
/// called after `validate_action` accepted the same action, and must not
/// mutate anything when it returns an error.
pub trait RuleEngine: Clone + Default + Send + 'static {
    const GAME_TYPE: GameType;

    /// Seats this game accepts
    fn player_count() -> PlayerCount;

    /// Side color for a seat, if the game has sides
    fn color_for_seat(_seat: usize) -> Option<PlayerColor> {
        None
    }

    fn turn_policy(&self) -> TurnPolicy {
        TurnPolicy::RoundRobin
    }

    /// Reset internal state for a fresh match with these players
    fn start(&mut self, players: &[Player], rng: &mut GameRng) -> Result<(), GameError>;

    /// Check an action for the player in `seat` without changing anything
    fn validate_action(&self, seat: usize, action: &PlayerAction) -> Result<(), GameError>;

    /// Apply a validated action
    fn apply_action(&mut self, seat: usize, action: &PlayerAction) -> Result<Applied, GameError>;

    /// Snapshot of the board payload
    fn board(&self) -> BoardState;

    fn is_game_over(&self) -> bool;

    /// Seat of the winner, if any
    fn winner(&self) -> Option<usize>;

    /// Whether a seat still takes part in turn order
    fn is_seat_active(&self, _seat: usize) -> bool {
        true
    }

    /// Hidden information for one seat
    fn private_view(&self, _seat: usize) -> Option<PrivateView> {
        None
    }

    /// Internal consistency check used by the registry
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Full match state at one point of the history
#[derive(Debug, Clone)]
struct Checkpoint<E> {
    engine: E,
    players: Vec<Player>,
    current: usize,
    status: MatchStatus,
}

/// A match of one game type: an engine plus shared turn bookkeeping
#[derive(Debug, Clone)]
pub struct Game<E: RuleEngine> {
    match_id: Uuid,
    players: Vec<Player>,
    current: usize,
    status: MatchStatus,
    engine: E,
    history: Vec<HistoryEntry>,
    /// `checkpoints[k]` is the state after `first_checkpoint + k` history entries
    checkpoints: VecDeque<Checkpoint<E>>,
    first_checkpoint: usize,
    rng: GameRng,
}

impl<E: RuleEngine> Game<E> {
    /// Create an empty match waiting for players
    pub fn new(match_id: Uuid, rng: GameRng) -> Self {
        Self {
            match_id,
            players: Vec::new(),
            current: 0,
            status: MatchStatus::WaitingForPlayers,
            engine: E::default(),
            history: Vec::new(),
            checkpoints: VecDeque::new(),
            first_checkpoint: 0,
            rng,
        }
    }

    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    pub fn game_type(&self) -> GameType {
        E::GAME_TYPE
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    fn seat_of(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    /// Give this match a new identity and RNG, e.g. when cloned from a prototype
    pub fn rebind(&mut self, match_id: Uuid, rng: GameRng) {
        self.match_id = match_id;
        self.rng = rng;
    }

    // ==================== Roster ====================

    /// Seat a player. Starts the match when the last seat fills.
    pub fn add_player(
        &mut self,
        id: impl Into<PlayerId>,
        name: impl Into<String>,
    ) -> Result<&Player, GameError> {
        let id = id.into();
        if self.status != MatchStatus::WaitingForPlayers {
            return Err(GameError::AlreadyStarted);
        }
        if self.seat_of(&id).is_some() {
            warn!(player = %id, game = %E::GAME_TYPE, "player already in game");
            return Err(GameError::DuplicatePlayer(id));
        }
        if self.players.len() >= E::player_count().max {
            return Err(GameError::GameFull);
        }

        let seat = self.players.len();
        self.players
            .push(Player::new(id, name.into(), seat, E::color_for_seat(seat)));

        if self.players.len() == E::player_count().max {
            if let Err(e) = self.start() {
                self.players.pop();
                return Err(e);
            }
        }
        Ok(&self.players[seat])
    }

    /// Remove a player before the match starts
    pub fn remove_player(&mut self, id: &PlayerId) -> Result<Player, GameError> {
        let Some(seat) = self.seat_of(id) else {
            warn!(player = %id, game = %E::GAME_TYPE, "player not found");
            return Err(GameError::UnknownPlayer(id.clone()));
        };
        if self.status != MatchStatus::WaitingForPlayers {
            return Err(GameError::AlreadyStarted);
        }

        let removed = self.players.remove(seat);
        for (seat, player) in self.players.iter_mut().enumerate() {
            player.seat = seat;
            player.color = E::color_for_seat(seat);
        }
        Ok(removed)
    }

    /// Start with the players seated so far
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.status != MatchStatus::WaitingForPlayers {
            return Err(GameError::AlreadyStarted);
        }
        let count = E::player_count();
        if !count.contains(self.players.len()) {
            return Err(GameError::WrongPlayerCount {
                game: E::GAME_TYPE,
                min: count.min,
                max: count.max,
                actual: self.players.len(),
            });
        }

        let mut engine = E::default();
        engine.start(&self.players, &mut self.rng)?;
        self.engine = engine;
        self.current = 0;
        self.status = MatchStatus::InProgress;
        self.history.clear();
        self.checkpoints.clear();
        self.first_checkpoint = 0;
        self.save_state();

        debug!(match_id = %self.match_id, game = %E::GAME_TYPE, players = self.players.len(), "match started");
        Ok(())
    }

    /// Reset for a fresh match with the given players, in seat order
    pub fn initialize_game(&mut self, players: &[PlayerId]) -> Result<(), GameError> {
        let count = E::player_count();
        if !count.contains(players.len()) {
            return Err(GameError::WrongPlayerCount {
                game: E::GAME_TYPE,
                min: count.min,
                max: count.max,
                actual: players.len(),
            });
        }
        for (i, id) in players.iter().enumerate() {
            if players[..i].contains(id) {
                return Err(GameError::DuplicatePlayer(id.clone()));
            }
        }

        let roster = players
            .iter()
            .enumerate()
            .map(|(seat, id)| Player::new(id.clone(), id.to_string(), seat, E::color_for_seat(seat)))
            .collect();
        let previous_players = std::mem::replace(&mut self.players, roster);
        let previous_status = std::mem::replace(&mut self.status, MatchStatus::WaitingForPlayers);
        if let Err(e) = self.start() {
            self.players = previous_players;
            self.status = previous_status;
            return Err(e);
        }
        Ok(())
    }

    // ==================== Turns ====================

    /// The player the turn indicator points at
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current)
    }

    pub fn current_turn(&self) -> usize {
        self.current
    }

    /// Advance the turn indicator round-robin
    pub fn next_turn(&mut self) -> Option<&Player> {
        if self.players.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.players.len();
        self.players.get(self.current)
    }

    /// Advance to the next seat the engine still considers active
    fn advance_turn(&mut self) {
        for _ in 0..self.players.len() {
            self.next_turn();
            if self.engine.is_seat_active(self.current) {
                return;
            }
        }
    }

    // ==================== Actions ====================

    /// Snapshot of a fresh board with the current roster
    pub fn initial_state(&self) -> GameState {
        GameState {
            match_id: self.match_id,
            game_type: E::GAME_TYPE,
            status: self.status,
            players: self.players.clone(),
            current_turn: 0,
            board: E::default().board(),
            history: Vec::new(),
            history_len: 0,
            winner: None,
        }
    }

    /// Check an action against status, turn and game rules without side effects
    pub fn check_action(&self, action: &PlayerAction) -> Result<usize, GameError> {
        match self.status {
            MatchStatus::WaitingForPlayers => return Err(GameError::NotStarted),
            MatchStatus::Finished => return Err(GameError::GameOver),
            MatchStatus::InProgress => {}
        }
        let seat = self
            .seat_of(&action.player_id)
            .ok_or_else(|| GameError::UnknownPlayer(action.player_id.clone()))?;

        match self.engine.turn_policy() {
            TurnPolicy::RoundRobin => {
                if seat != self.current {
                    return Err(GameError::NotYourTurn);
                }
            }
            TurnPolicy::Simultaneous => {
                if !self.engine.is_seat_active(seat) {
                    return Err(GameError::InvalidAction(format!(
                        "{} can no longer act",
                        action.player_id
                    )));
                }
            }
        }

        self.engine.validate_action(seat, action)?;
        Ok(seat)
    }

    pub fn validate_action(&self, action: &PlayerAction) -> bool {
        self.check_action(action).is_ok()
    }

    /// Validate and apply an action, returning the new snapshot
    pub fn apply_action(&mut self, action: PlayerAction) -> Result<GameState, GameError> {
        self.apply_with_message(action).map(|(state, _)| state)
    }

    fn apply_with_message(
        &mut self,
        action: PlayerAction,
    ) -> Result<(GameState, Option<String>), GameError> {
        let seat = self.check_action(&action)?;
        let applied = self.engine.apply_action(seat, &action)?;

        if applied.advance_turn && self.engine.turn_policy() == TurnPolicy::RoundRobin {
            self.advance_turn();
        }
        if self.engine.is_game_over() {
            self.status = MatchStatus::Finished;
            debug!(match_id = %self.match_id, game = %E::GAME_TYPE, winner = ?self.engine.winner(), "match finished");
        }

        self.history.push(HistoryEntry::Action {
            sequence: self.history.len() + 1,
            player_id: action.player_id.clone(),
            action,
            turn_after: self.current,
        });
        self.save_state();

        Ok((self.get_state(), applied.message))
    }

    /// Transport entry point: never fails, reports the outcome instead
    pub fn handle_action(&mut self, action: PlayerAction) -> ActionResult {
        match self.apply_with_message(action) {
            Ok((state, message)) => {
                ActionResult::accepted(message.unwrap_or_else(|| "Action accepted".into()), state)
            }
            Err(e) => {
                debug!(match_id = %self.match_id, error = %e, "action rejected");
                ActionResult::rejected(&e)
            }
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    pub fn get_winner(&self) -> Option<&Player> {
        self.engine.winner().and_then(|seat| self.players.get(seat))
    }

    /// Current snapshot. Only the tail of the history is included; the
    /// full history is available from [`Game::get_game_history`].
    pub fn get_state(&self) -> GameState {
        let tail = self.history.len().saturating_sub(HISTORY_WINDOW);
        GameState {
            match_id: self.match_id,
            game_type: E::GAME_TYPE,
            status: self.status,
            players: self.players.clone(),
            current_turn: self.current,
            board: self.engine.board(),
            history: self.history[tail..].to_vec(),
            history_len: self.history.len(),
            winner: self.get_winner().cloned(),
        }
    }

    /// Hidden information for a seated player
    pub fn private_view(&self, id: &PlayerId) -> Option<PrivateView> {
        if self.status == MatchStatus::WaitingForPlayers {
            return None;
        }
        self.engine.private_view(self.seat_of(id)?)
    }

    // ==================== History ====================

    pub fn get_game_history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Number of checkpoints saved so far, including dropped ones
    pub fn checkpoint_count(&self) -> usize {
        self.first_checkpoint + self.checkpoints.len()
    }

    /// Index of the oldest checkpoint that can still be restored
    pub fn oldest_checkpoint(&self) -> usize {
        self.first_checkpoint
    }

    fn save_state(&mut self) {
        if self.checkpoints.len() == MAX_CHECKPOINTS {
            self.checkpoints.pop_front();
            self.first_checkpoint += 1;
        }
        self.checkpoints.push_back(Checkpoint {
            engine: self.engine.clone(),
            players: self.players.clone(),
            current: self.current,
            status: self.status,
        });
    }

    /// Apply a host-driven change to the engine, recording it like an action
    pub(crate) fn transition<T>(
        &mut self,
        description: impl Into<String>,
        change: impl FnOnce(&mut E) -> T,
    ) -> Result<T, GameError> {
        match self.status {
            MatchStatus::WaitingForPlayers => return Err(GameError::NotStarted),
            MatchStatus::Finished => return Err(GameError::GameOver),
            MatchStatus::InProgress => {}
        }
        let value = change(&mut self.engine);
        self.history.push(HistoryEntry::Transition {
            sequence: self.history.len() + 1,
            description: description.into(),
        });
        self.save_state();
        Ok(value)
    }

    /// Restore the state after `index` history entries.
    ///
    /// The history keeps growing: the restore itself is recorded.
    pub fn load_state(&mut self, index: usize) -> Result<GameState, GameError> {
        let checkpoint = index
            .checked_sub(self.first_checkpoint)
            .and_then(|k| self.checkpoints.get(k))
            .cloned()
            .ok_or(GameError::NoSuchCheckpoint(index))?;

        self.engine = checkpoint.engine;
        self.players = checkpoint.players;
        self.current = checkpoint.current;
        self.status = checkpoint.status;
        self.history.push(HistoryEntry::Restored {
            sequence: self.history.len() + 1,
            checkpoint: index,
        });
        self.save_state();

        Ok(self.get_state())
    }

    /// Invariant check used by the registry
    pub fn is_healthy(&self) -> bool {
        let turn_ok = self.players.is_empty() || self.current < self.players.len();
        let seats_ok = self.players.iter().enumerate().all(|(i, p)| p.seat == i);
        let board_ok = self.engine.board().game_type() == E::GAME_TYPE;
        turn_ok && seats_ok && board_ok && self.engine.is_healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::gomoku::Gomoku;
    use crate::games::poker::Poker;
    use pretty_assertions::assert_eq;

    fn gomoku_match() -> Game<Gomoku> {
        let mut game = Game::new(Uuid::new_v4(), GameRng::with_seed(1));
        game.add_player("black", "Black").unwrap();
        game.add_player("white", "White").unwrap();
        game
    }

    fn place(player: &str, x: usize, y: usize) -> PlayerAction {
        PlayerAction::new(player, "place").with("x", x).with("y", y)
    }

    #[test]
    fn test_starts_when_seats_fill() {
        let mut game: Game<Gomoku> = Game::new(Uuid::new_v4(), GameRng::with_seed(1));
        assert_eq!(game.status(), MatchStatus::WaitingForPlayers);
        game.add_player("black", "Black").unwrap();
        assert_eq!(game.status(), MatchStatus::WaitingForPlayers);
        game.add_player("white", "White").unwrap();
        assert_eq!(game.status(), MatchStatus::InProgress);
        assert_eq!(game.players()[0].color, Some(PlayerColor::Black));
        assert_eq!(game.players()[1].color, Some(PlayerColor::White));
    }

    #[test]
    fn test_duplicate_player_rejected() {
        let mut game: Game<Gomoku> = Game::new(Uuid::new_v4(), GameRng::with_seed(1));
        game.add_player("a", "A").unwrap();
        assert_eq!(
            game.add_player("a", "Again").unwrap_err(),
            GameError::DuplicatePlayer(PlayerId::new("a"))
        );
        assert_eq!(game.players().len(), 1);
    }

    #[test]
    fn test_remove_player_reseats() {
        let mut game: Game<Poker> = Game::new(Uuid::new_v4(), GameRng::with_seed(1));
        game.add_player("a", "A").unwrap();
        game.add_player("b", "B").unwrap();
        game.add_player("c", "C").unwrap();
        game.remove_player(&PlayerId::new("a")).unwrap();
        assert_eq!(game.players()[0].id, PlayerId::new("b"));
        assert_eq!(game.players()[0].seat, 0);
        assert_eq!(game.players()[1].seat, 1);
        assert!(game.remove_player(&PlayerId::new("zz")).is_err());
    }

    #[test]
    fn test_explicit_start_needs_minimum() {
        let mut game: Game<Poker> = Game::new(Uuid::new_v4(), GameRng::with_seed(1));
        game.add_player("a", "A").unwrap();
        assert!(matches!(
            game.start(),
            Err(GameError::WrongPlayerCount { actual: 1, .. })
        ));
        game.add_player("b", "B").unwrap();
        game.start().unwrap();
        assert_eq!(game.status(), MatchStatus::InProgress);
        assert_eq!(game.add_player("c", "C").unwrap_err(), GameError::AlreadyStarted);
    }

    #[test]
    fn test_action_before_start_rejected() {
        let mut game: Game<Gomoku> = Game::new(Uuid::new_v4(), GameRng::with_seed(1));
        game.add_player("black", "Black").unwrap();
        assert_eq!(
            game.apply_action(place("black", 0, 0)).unwrap_err(),
            GameError::NotStarted
        );
    }

    #[test]
    fn test_turn_violation_is_distinct() {
        let mut game = gomoku_match();
        let result = game.handle_action(place("white", 7, 7));
        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("not_your_turn"));

        let result = game.handle_action(place("black", 99, 7));
        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("invalid_move"));
    }

    #[test]
    fn test_accepted_action_advances_and_records() {
        let mut game = gomoku_match();
        let result = game.handle_action(place("black", 7, 7));
        assert!(result.success);
        let state = result.new_state.unwrap();
        assert_eq!(state.current_turn, 1);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].sequence(), 1);
        assert_eq!(game.checkpoint_count(), 2);
    }

    #[test]
    fn test_next_turn_wraps() {
        let mut game = gomoku_match();
        assert_eq!(game.next_turn().unwrap().id, PlayerId::new("white"));
        assert_eq!(game.next_turn().unwrap().id, PlayerId::new("black"));
    }

    #[test]
    fn test_load_state_restores_and_keeps_history() {
        let mut game = gomoku_match();
        let start = game.get_state();
        game.apply_action(place("black", 7, 7)).unwrap();
        game.apply_action(place("white", 8, 8)).unwrap();

        let restored = game.load_state(0).unwrap();
        assert_eq!(restored.board, start.board);
        assert_eq!(restored.current_turn, 0);
        assert_eq!(restored.history.len(), 3);
        assert!(matches!(
            restored.history[2],
            HistoryEntry::Restored { checkpoint: 0, .. }
        ));

        // The cell is free again
        game.apply_action(place("black", 8, 8)).unwrap();
        assert_eq!(game.get_game_history().len(), 4);
    }

    #[test]
    fn test_load_state_out_of_range() {
        let mut game = gomoku_match();
        let before = game.get_state();
        assert_eq!(game.load_state(5).unwrap_err(), GameError::NoSuchCheckpoint(5));
        assert_eq!(game.get_state(), before);
    }

    #[test]
    fn test_long_match_keeps_snapshots_and_checkpoints_bounded() {
        let mut game: Game<Poker> = Game::new(Uuid::new_v4(), GameRng::with_seed(1));
        game.add_player("a", "A").unwrap();
        game.add_player("b", "B").unwrap();
        game.start().unwrap();

        for turn in 0..1000 {
            let player = if turn % 2 == 0 { "a" } else { "b" };
            let action = if turn % 10 == 0 {
                PlayerAction::new(player, "raise").with("amount", turn as u64 + 1)
            } else {
                PlayerAction::new(player, "call")
            };
            let state = game.apply_action(action).unwrap();
            assert!(state.history.len() <= HISTORY_WINDOW);
        }

        let state = game.get_state();
        assert_eq!(state.history_len, 1000);
        assert_eq!(state.history.len(), HISTORY_WINDOW);
        assert_eq!(state.history.last().map(HistoryEntry::sequence), Some(1000));
        assert_eq!(game.get_game_history().len(), 1000);

        assert_eq!(game.checkpoint_count(), 1001);
        assert_eq!(game.checkpoint_count() - game.oldest_checkpoint(), MAX_CHECKPOINTS);
        assert_eq!(game.load_state(0).unwrap_err(), GameError::NoSuchCheckpoint(0));
        let oldest = game.oldest_checkpoint();
        assert!(game.load_state(oldest).is_ok());
    }

    #[test]
    fn test_initialize_game_resets() {
        let mut game = gomoku_match();
        game.apply_action(place("black", 7, 7)).unwrap();
        game.initialize_game(&[PlayerId::new("x"), PlayerId::new("y")])
            .unwrap();
        let state = game.get_state();
        assert_eq!(state.history.len(), 0);
        assert_eq!(state.board, game.initial_state().board);
        assert_eq!(state.players[0].id, PlayerId::new("x"));
        assert_eq!(state.status, MatchStatus::InProgress);

        assert!(game
            .initialize_game(&[PlayerId::new("x"), PlayerId::new("x")])
            .is_err());
        assert!(game.initialize_game(&[PlayerId::new("x")]).is_err());
    }

    #[test]
    fn test_healthy_match() {
        assert!(gomoku_match().is_healthy());
    }
}
