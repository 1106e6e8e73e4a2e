//! Match room management.

use gamehall_core::{
    ActionResult, AnyGame, GameState, GameType, MatchStatus, Player, PlayerAction, PlayerId,
    PrivateView,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::RoomError;
use crate::protocol::{MatchInfo, PlayerInfo};

/// The engine-side identity of a connected player
pub fn game_player_id(id: Uuid) -> PlayerId {
    PlayerId::new(id.to_string())
}

/// A connection seated in a match.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub name: String,
    pub connected: bool,
}

impl RoomPlayer {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            connected: true,
        }
    }

    pub fn to_info(&self, seat: Option<usize>) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            seat,
            connected: self.connected,
        }
    }
}

/// One hosted match: the connected players plus their own game instance.
pub struct MatchRoom {
    pub id: Uuid,
    pub name: String,
    pub host_id: Uuid,
    pub players: HashMap<Uuid, RoomPlayer>,
    /// Join order, which is also seat order while waiting
    pub player_order: Vec<Uuid>,
    pub game: AnyGame,
    last_activity: Instant,
}

impl MatchRoom {
    /// Open a room around a fresh match and seat the host
    pub fn new(game: AnyGame, host_id: Uuid, host_name: String) -> Result<Self, RoomError> {
        let mut room = Self {
            id: game.match_id(),
            name: format!("{}'s {}", host_name, game.game_type()),
            host_id,
            players: HashMap::new(),
            player_order: Vec::new(),
            game,
            last_activity: Instant::now(),
        };
        room.add_player(host_id, host_name)?;
        Ok(room)
    }

    pub fn game_type(&self) -> GameType {
        self.game.game_type()
    }

    pub fn status(&self) -> MatchStatus {
        self.game.status()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn member_ids(&self) -> Vec<Uuid> {
        self.player_order.clone()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Seat a player; the match starts by itself when the last seat fills
    pub fn add_player(&mut self, player_id: Uuid, name: String) -> Result<(), RoomError> {
        if self.players.contains_key(&player_id) {
            return Err(RoomError::AlreadyInMatch);
        }
        self.game
            .add_player(game_player_id(player_id), name.clone())?;
        self.players
            .insert(player_id, RoomPlayer::new(player_id, name));
        self.player_order.push(player_id);
        self.touch();
        Ok(())
    }

    /// Remove a player. Returns true if the room is now empty.
    ///
    /// Before the match starts the seat is freed; afterwards the seat stays
    /// with the game and only the connection leaves.
    pub fn remove_player(&mut self, player_id: Uuid) -> Result<bool, RoomError> {
        if !self.players.contains_key(&player_id) {
            return Err(RoomError::NotInMatch);
        }
        if self.status() == MatchStatus::WaitingForPlayers {
            self.game.remove_player(&game_player_id(player_id))?;
        }

        self.players.remove(&player_id);
        self.player_order.retain(|&id| id != player_id);

        // If host left, assign new host
        if player_id == self.host_id && !self.player_order.is_empty() {
            self.host_id = self.player_order[0];
        }

        self.touch();
        Ok(self.players.is_empty())
    }

    pub fn set_player_connected(&mut self, player_id: Uuid, connected: bool) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.connected = connected;
        }
    }

    fn require_host(&self, requester_id: Uuid) -> Result<(), RoomError> {
        if requester_id == self.host_id {
            Ok(())
        } else {
            Err(RoomError::NotHost)
        }
    }

    pub fn start_game(&mut self, requester_id: Uuid) -> Result<GameState, RoomError> {
        self.require_host(requester_id)?;
        self.game.start()?;
        self.touch();
        Ok(self.game.get_state())
    }

    /// Decode and apply a raw action for `player_id`. Rejections are reported
    /// in the result rather than as an error.
    pub fn apply_action(
        &mut self,
        player_id: Uuid,
        action: serde_json::Value,
    ) -> Result<ActionResult, RoomError> {
        if !self.players.contains_key(&player_id) {
            return Err(RoomError::NotInMatch);
        }
        let action = match PlayerAction::from_value(game_player_id(player_id), action) {
            Ok(action) => action,
            Err(e) => return Ok(ActionResult::rejected(&e)),
        };
        self.touch();
        Ok(self.game.handle_action(action))
    }

    /// Host-only: restore an earlier checkpoint
    pub fn undo(&mut self, requester_id: Uuid, checkpoint: usize) -> Result<GameState, RoomError> {
        self.require_host(requester_id)?;
        let state = self.game.load_state(checkpoint)?;
        self.touch();
        Ok(state)
    }

    /// Host-only: flip night and day in a werewolf match
    pub fn toggle_phase(&mut self, requester_id: Uuid) -> Result<GameState, RoomError> {
        self.require_host(requester_id)?;
        self.game.toggle_phase()?;
        self.touch();
        Ok(self.game.get_state())
    }

    pub fn get_game_state(&self) -> GameState {
        self.game.get_state()
    }

    pub fn private_view(&self, player_id: Uuid) -> Option<PrivateView> {
        self.game.private_view(&game_player_id(player_id))
    }

    /// Connection id of the player whose turn it is
    pub fn current_player(&self) -> Option<(Uuid, usize)> {
        let player = self.game.current_player()?;
        let id = Uuid::parse_str(player.id.as_str()).ok()?;
        Some((id, player.seat))
    }

    pub fn get_winner(&self) -> Option<Player> {
        self.game.get_winner().cloned()
    }

    pub fn player_name(&self, player_id: Uuid) -> Option<String> {
        self.players.get(&player_id).map(|p| p.name.clone())
    }

    pub fn to_info(&self) -> MatchInfo {
        let (_, max_players) = self.game.seat_range();
        MatchInfo {
            id: self.id,
            name: self.name.clone(),
            game_type: self.game_type(),
            players: self
                .player_order
                .iter()
                .filter_map(|id| {
                    let seat = self.game.player(&game_player_id(*id)).map(|p| p.seat);
                    self.players.get(id).map(|p| p.to_info(seat))
                })
                .collect(),
            max_players,
            host_id: self.host_id,
            status: self.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamehall_core::GameRng;
    use serde_json::json;

    fn room(game_type: GameType) -> (MatchRoom, Uuid) {
        let host_id = Uuid::new_v4();
        let game = AnyGame::new(game_type, Uuid::new_v4(), GameRng::with_seed(1));
        (MatchRoom::new(game, host_id, "Host".to_string()).unwrap(), host_id)
    }

    #[test]
    fn test_create_room() {
        let (room, host_id) = room(GameType::Chess);

        assert_eq!(room.player_count(), 1);
        assert_eq!(room.host_id, host_id);
        assert_eq!(room.status(), MatchStatus::WaitingForPlayers);
        assert_eq!(room.to_info().max_players, 2);
        assert_eq!(room.to_info().players[0].seat, Some(0));
    }

    #[test]
    fn test_two_player_match_starts_when_full() {
        let (mut room, host_id) = room(GameType::Gomoku);
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();
        assert_eq!(room.status(), MatchStatus::InProgress);

        // Can't add more players
        assert!(room.add_player(Uuid::new_v4(), "Player 3".to_string()).is_err());
        // Nor start again
        assert!(room.start_game(host_id).is_err());
    }

    #[test]
    fn test_add_remove_players() {
        let (mut room, host_id) = room(GameType::Poker);
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();
        assert!(matches!(
            room.add_player(player2, "Again".to_string()),
            Err(RoomError::AlreadyInMatch)
        ));

        let empty = room.remove_player(host_id).unwrap();
        assert!(!empty);
        assert_eq!(room.host_id, player2);
        assert_eq!(room.game.players().len(), 1);
        assert_eq!(room.to_info().players[0].seat, Some(0));
    }

    #[test]
    fn test_start_game_host_only() {
        let (mut room, host_id) = room(GameType::Poker);

        // Can't start with only 1 player
        assert!(room.start_game(host_id).is_err());

        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();

        // Non-host can't start
        assert!(matches!(room.start_game(player2), Err(RoomError::NotHost)));

        let state = room.start_game(host_id).unwrap();
        assert_eq!(state.status, MatchStatus::InProgress);
        assert!(room.private_view(player2).is_some());
    }

    #[test]
    fn test_actions_and_undo() {
        let (mut room, host_id) = room(GameType::Gomoku);
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();

        let result = room
            .apply_action(player2, json!({"type": "place", "x": 1, "y": 1}))
            .unwrap();
        assert_eq!(result.error_code.as_deref(), Some("not_your_turn"));

        let result = room
            .apply_action(host_id, json!({"type": "place", "x": 1, "y": 1}))
            .unwrap();
        assert!(result.success);
        assert_eq!(room.current_player(), Some((player2, 1)));

        assert!(matches!(room.undo(player2, 0), Err(RoomError::NotHost)));
        let state = room.undo(host_id, 0).unwrap();
        assert_eq!(state.current_turn, 0);
        assert_eq!(state.history.len(), 2);

        let result = room.apply_action(host_id, json!("place")).unwrap();
        assert_eq!(result.error_code.as_deref(), Some("invalid_action"));
        assert!(room.apply_action(Uuid::new_v4(), json!({"type": "place"})).is_err());
    }
}
