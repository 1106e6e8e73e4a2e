//! A match of any game type behind one concrete type.
//!
//! The transport only ever sees `AnyGame`. Each variant wraps the generic
//! [`Game`] for one engine, so the dispatch here is pure delegation.

use crate::actions::{ActionResult, HistoryEntry, PlayerAction};
use crate::engine::{Game, RuleEngine};
use crate::game::{GameError, GameState, GameType, MatchStatus, PrivateView};
use crate::games::chess::Chess;
use crate::games::go::Go;
use crate::games::gomoku::Gomoku;
use crate::games::mahjong::Mahjong;
use crate::games::poker::Poker;
use crate::games::werewolf::{Phase, Werewolf};
use crate::games::xiangqi::Xiangqi;
use crate::player::{Player, PlayerId};
use crate::rng::GameRng;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum AnyGame {
    Gomoku(Game<Gomoku>),
    Chess(Game<Chess>),
    ChineseChess(Game<Xiangqi>),
    Go(Game<Go>),
    Poker(Game<Poker>),
    Werewolf(Game<Werewolf>),
    Mahjong(Game<Mahjong>),
}

macro_rules! dispatch {
    ($value:expr, $game:ident => $body:expr) => {
        match $value {
            AnyGame::Gomoku($game) => $body,
            AnyGame::Chess($game) => $body,
            AnyGame::ChineseChess($game) => $body,
            AnyGame::Go($game) => $body,
            AnyGame::Poker($game) => $body,
            AnyGame::Werewolf($game) => $body,
            AnyGame::Mahjong($game) => $body,
        }
    };
}

impl AnyGame {
    /// An empty match of the given type
    pub fn new(game_type: GameType, match_id: Uuid, rng: GameRng) -> Self {
        match game_type {
            GameType::Gomoku => AnyGame::Gomoku(Game::new(match_id, rng)),
            GameType::Chess => AnyGame::Chess(Game::new(match_id, rng)),
            GameType::ChineseChess => AnyGame::ChineseChess(Game::new(match_id, rng)),
            GameType::Go => AnyGame::Go(Game::new(match_id, rng)),
            GameType::Poker => AnyGame::Poker(Game::new(match_id, rng)),
            GameType::Werewolf => AnyGame::Werewolf(Game::new(match_id, rng)),
            GameType::Mahjong => AnyGame::Mahjong(Game::new(match_id, rng)),
        }
    }

    pub fn game_type(&self) -> GameType {
        dispatch!(self, g => g.game_type())
    }

    pub fn match_id(&self) -> Uuid {
        dispatch!(self, g => g.match_id())
    }

    pub fn status(&self) -> MatchStatus {
        dispatch!(self, g => g.status())
    }

    pub fn players(&self) -> &[Player] {
        dispatch!(self, g => g.players())
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        dispatch!(self, g => g.player(id))
    }

    /// Seats `(min, max)` this game type accepts
    pub fn seat_range(&self) -> (usize, usize) {
        let count = match self {
            AnyGame::Gomoku(_) => Gomoku::player_count(),
            AnyGame::Chess(_) => Chess::player_count(),
            AnyGame::ChineseChess(_) => Xiangqi::player_count(),
            AnyGame::Go(_) => Go::player_count(),
            AnyGame::Poker(_) => Poker::player_count(),
            AnyGame::Werewolf(_) => Werewolf::player_count(),
            AnyGame::Mahjong(_) => Mahjong::player_count(),
        };
        (count.min, count.max)
    }

    pub fn rebind(&mut self, match_id: Uuid, rng: GameRng) {
        dispatch!(self, g => g.rebind(match_id, rng))
    }

    pub fn add_player(
        &mut self,
        id: impl Into<PlayerId>,
        name: impl Into<String>,
    ) -> Result<&Player, GameError> {
        dispatch!(self, g => g.add_player(id, name))
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> Result<Player, GameError> {
        dispatch!(self, g => g.remove_player(id))
    }

    pub fn start(&mut self) -> Result<(), GameError> {
        dispatch!(self, g => g.start())
    }

    pub fn initialize_game(&mut self, players: &[PlayerId]) -> Result<(), GameError> {
        dispatch!(self, g => g.initialize_game(players))
    }

    pub fn current_player(&self) -> Option<&Player> {
        dispatch!(self, g => g.current_player())
    }

    pub fn initial_state(&self) -> GameState {
        dispatch!(self, g => g.initial_state())
    }

    pub fn validate_action(&self, action: &PlayerAction) -> bool {
        dispatch!(self, g => g.validate_action(action))
    }

    pub fn apply_action(&mut self, action: PlayerAction) -> Result<GameState, GameError> {
        dispatch!(self, g => g.apply_action(action))
    }

    pub fn handle_action(&mut self, action: PlayerAction) -> ActionResult {
        dispatch!(self, g => g.handle_action(action))
    }

    pub fn get_state(&self) -> GameState {
        dispatch!(self, g => g.get_state())
    }

    pub fn private_view(&self, id: &PlayerId) -> Option<PrivateView> {
        dispatch!(self, g => g.private_view(id))
    }

    pub fn is_game_over(&self) -> bool {
        dispatch!(self, g => g.is_game_over())
    }

    pub fn get_winner(&self) -> Option<&Player> {
        dispatch!(self, g => g.get_winner())
    }

    pub fn get_game_history(&self) -> &[HistoryEntry] {
        dispatch!(self, g => g.get_game_history())
    }

    pub fn checkpoint_count(&self) -> usize {
        dispatch!(self, g => g.checkpoint_count())
    }

    pub fn load_state(&mut self, index: usize) -> Result<GameState, GameError> {
        dispatch!(self, g => g.load_state(index))
    }

    pub fn is_healthy(&self) -> bool {
        dispatch!(self, g => g.is_healthy())
    }

    /// Flip night and day in a running werewolf match
    pub fn toggle_phase(&mut self) -> Result<Phase, GameError> {
        let game_type = self.game_type();
        let AnyGame::Werewolf(game) = self else {
            return Err(GameError::InvalidAction(format!("{game_type} has no phases")));
        };
        let next = game.engine().phase().flipped();
        game.transition(format!("Phase changed to {next}"), Werewolf::toggle_phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::BoardState;

    #[test]
    fn test_every_type_constructs_healthy() {
        for game_type in GameType::ALL {
            let game = AnyGame::new(game_type, Uuid::new_v4(), GameRng::with_seed(1));
            assert_eq!(game.game_type(), game_type);
            assert_eq!(game.status(), MatchStatus::WaitingForPlayers);
            assert_eq!(game.initial_state().board.game_type(), game_type);
            assert!(game.is_healthy(), "{game_type} unhealthy");
        }
    }

    #[test]
    fn test_clone_does_not_share_state() {
        let mut prototype = AnyGame::new(GameType::Gomoku, Uuid::new_v4(), GameRng::with_seed(1));
        let mut copy = prototype.clone();
        copy.rebind(Uuid::new_v4(), GameRng::with_seed(2));
        copy.add_player("a", "A").unwrap();
        assert!(prototype.players().is_empty());
        assert_ne!(prototype.match_id(), copy.match_id());
        prototype.add_player("b", "B").unwrap();
        assert_eq!(copy.players()[0].id, PlayerId::new("a"));
    }

    #[test]
    fn test_toggle_phase_only_for_running_werewolf() {
        let mut gomoku = AnyGame::new(GameType::Gomoku, Uuid::new_v4(), GameRng::with_seed(1));
        assert!(gomoku.toggle_phase().is_err());

        let mut wolves = AnyGame::new(GameType::Werewolf, Uuid::new_v4(), GameRng::with_seed(1));
        assert_eq!(wolves.toggle_phase(), Err(GameError::NotStarted));
        for i in 0..5 {
            wolves.add_player(format!("p{i}"), format!("P{i}")).unwrap();
        }
        wolves.start().unwrap();
        assert_eq!(wolves.toggle_phase(), Ok(Phase::Day));
        let BoardState::Werewolf(board) = wolves.get_state().board else {
            panic!("expected a werewolf board");
        };
        assert_eq!(board.phase, Phase::Day);
    }

    #[test]
    fn test_phase_change_is_recorded_and_restorable() {
        let mut wolves = AnyGame::new(GameType::Werewolf, Uuid::new_v4(), GameRng::with_seed(1));
        for i in 0..5 {
            wolves.add_player(format!("p{i}"), format!("P{i}")).unwrap();
        }
        wolves.start().unwrap();
        wolves.toggle_phase().unwrap();

        assert!(matches!(
            wolves.get_game_history(),
            [HistoryEntry::Transition { sequence: 1, .. }]
        ));
        assert_eq!(wolves.checkpoint_count(), 2);

        // Restoring the latest checkpoint keeps the day phase
        let state = wolves.load_state(1).unwrap();
        let BoardState::Werewolf(board) = state.board else {
            panic!("expected a werewolf board");
        };
        assert_eq!(board.phase, Phase::Day);
    }

    #[test]
    fn test_private_view_after_start() {
        let mut poker = AnyGame::new(GameType::Poker, Uuid::new_v4(), GameRng::with_seed(4));
        poker.add_player("a", "A").unwrap();
        poker.add_player("b", "B").unwrap();
        assert_eq!(poker.private_view(&PlayerId::new("a")), None);
        poker.start().unwrap();
        assert!(matches!(
            poker.private_view(&PlayerId::new("a")),
            Some(PrivateView::HoleCards { cards }) if cards.len() == 2
        ));
        assert_eq!(poker.private_view(&PlayerId::new("nobody")), None);
    }
}
