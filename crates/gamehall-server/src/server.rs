//! WebSocket server and connection handling.

use crate::config::ServerConfig;
use crate::error::{RegistryError, RoomError};
use crate::protocol::{ClientMessage, MatchInfo, ServerMessage};
use crate::registry::EngineRegistry;
use crate::room::MatchRoom;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use gamehall_core::{GameState, GameType, MatchStatus, UnsupportedGameType};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    pub config: ServerConfig,
    pub registry: EngineRegistry,
    /// All active matches, each behind its own lock
    pub rooms: DashMap<Uuid, Arc<Mutex<MatchRoom>>>,
    /// Mapping from player ID to their match ID
    pub player_rooms: DashMap<Uuid, Uuid>,
    /// Mapping from player ID to their message sender
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl ServerState {
    pub fn new(config: ServerConfig, registry: EngineRegistry) -> Self {
        Self {
            config,
            registry,
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            player_senders: DashMap::new(),
        }
    }

    /// Send a message to a specific player.
    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    fn send_to_all(&self, players: &[Uuid], msg: ServerMessage) {
        for player_id in players {
            self.send_to_player(*player_id, msg.clone());
        }
    }

    /// Clone the match handle out of the map so no shard lock is held
    fn room(&self, room_id: Uuid) -> Result<Arc<Mutex<MatchRoom>>, RoomError> {
        self.rooms
            .get(&room_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RoomError::MatchNotFound)
    }

    fn members_of(&self, room_id: Uuid) -> Vec<Uuid> {
        let Ok(room) = self.room(room_id) else {
            return Vec::new();
        };
        lock(&room)
            .map(|room| room.member_ids())
            .unwrap_or_default()
    }

    /// Broadcast a message to all players in a match.
    pub fn broadcast_to_room(&self, room_id: Uuid, msg: ServerMessage) {
        let members = self.members_of(room_id);
        self.send_to_all(&members, msg);
    }

    /// Broadcast a message to all players in a match except one.
    pub fn broadcast_to_room_except(&self, room_id: Uuid, except: Uuid, msg: ServerMessage) {
        let members: Vec<Uuid> = self
            .members_of(room_id)
            .into_iter()
            .filter(|id| *id != except)
            .collect();
        self.send_to_all(&members, msg);
    }

    /// Get list of matches waiting for players.
    pub fn get_waiting_rooms(&self) -> Vec<MatchInfo> {
        let rooms: Vec<_> = self.rooms.iter().map(|r| Arc::clone(r.value())).collect();
        rooms
            .iter()
            .filter_map(|room| lock(room).ok())
            .filter(|room| room.status() == MatchStatus::WaitingForPlayers)
            .map(|room| room.to_info())
            .collect()
    }

    fn room_of(&self, player_id: Uuid) -> Result<Uuid, RoomError> {
        self.player_rooms
            .get(&player_id)
            .map(|entry| *entry)
            .ok_or(RoomError::NotInMatch)
    }

    /// Run `f` against the player's match with its lock held, returning
    /// the match id alongside the result.
    fn with_room<T>(
        &self,
        player_id: Uuid,
        f: impl FnOnce(&mut MatchRoom) -> Result<T, RoomError>,
    ) -> Result<(Uuid, T), RoomError> {
        let room_id = self.room_of(player_id)?;
        let room = self.room(room_id)?;
        let mut room = lock(&room)?;
        let value = f(&mut *room)?;
        Ok((room_id, value))
    }

    /// Push the public state to everyone, each seat's private view to that
    /// seat, and then the turn change or the final result.
    fn publish_game(&self, room_id: Uuid, game_state: GameState, started: bool) {
        let Ok(handle) = self.room(room_id) else {
            return;
        };
        let Ok(room) = lock(&handle) else {
            return;
        };
        let members = room.member_ids();
        let views: Vec<_> = members
            .iter()
            .filter_map(|id| room.private_view(*id).map(|view| (*id, view)))
            .collect();
        let current = room.current_player();
        drop(room);

        let finished = game_state.is_finished();
        let winner = game_state.winner.clone();
        let seat = game_state.current_turn;
        let msg = if started {
            ServerMessage::GameStarted { state: game_state }
        } else {
            ServerMessage::GameState { state: game_state }
        };
        self.send_to_all(&members, msg);

        for (player_id, view) in views {
            self.send_to_player(player_id, ServerMessage::PrivateState { view });
        }

        if finished {
            info!(%room_id, winner = ?winner.as_ref().map(|p| &p.name), "match finished");
            self.send_to_all(&members, ServerMessage::GameOver { winner });
        } else {
            self.send_to_all(
                &members,
                ServerMessage::TurnChanged {
                    seat,
                    player_id: current.map(|(id, _)| id),
                },
            );
        }
    }

    /// Drop matches idle for at least `max_idle`. Returns how many were removed.
    #[instrument(skip(self))]
    pub fn reap_idle_matches(&self, max_idle: Duration) -> usize {
        let rooms: Vec<_> = self
            .rooms
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect();
        // A poisoned match can never be used again, so it counts as idle
        let idle: Vec<Uuid> = rooms
            .into_iter()
            .filter(|(_, room)| lock(room).map_or(true, |room| room.idle_for() >= max_idle))
            .map(|(room_id, _)| room_id)
            .collect();

        let mut reaped = 0;
        for room_id in idle {
            let Some((_, room)) = self.rooms.remove(&room_id) else {
                continue;
            };
            let members = room
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .member_ids();
            for player_id in members {
                self.player_rooms.remove_if(&player_id, |_, r| *r == room_id);
                self.send_to_player(
                    player_id,
                    ServerMessage::error("match_expired", "Match closed after inactivity"),
                );
            }
            reaped += 1;
        }
        if reaped > 0 {
            debug!(reaped, "reaped idle matches");
        }
        reaped
    }
}

/// Lock one match; a poisoned lock makes the match unavailable
fn lock(room: &Mutex<MatchRoom>) -> Result<MutexGuard<'_, MatchRoom>, RoomError> {
    room.lock().map_err(|_| RoomError::MatchUnavailable)
}

/// Periodically remove idle matches until the process exits.
pub async fn run_reaper(state: Arc<ServerState>) {
    let mut interval = tokio::time::interval(state.config.reap_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        state.reap_idle_matches(state.config.match_idle_timeout);
    }
}

/// Run the WebSocket server.
pub async fn run_server(state: Arc<ServerState>) -> anyhow::Result<()> {
    let addr = state.config.addr;
    let listener = TcpListener::bind(addr).await?;
    info!("Gamehall server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Assign a player ID
    let player_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    // Send welcome message
    let welcome = ServerMessage::Welcome { player_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text.into())).await?;

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(player_id, client_msg, &state).await,
                Err(e) => {
                    warn!("Invalid message from {}: {}", player_id, e);
                    state.send_to_player(player_id, ServerMessage::error("invalid_message", e));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", player_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_player(player_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", player_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    handle_disconnect(player_id, &state);
    state.player_senders.remove(&player_id);
    send_task.abort();

    info!("Connection closed for {}", player_id);
    Ok(())
}

/// Handle a client message, reporting any failure back to the sender.
pub async fn handle_message(player_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    if let Err(e) = dispatch_message(player_id, msg, state).await {
        debug!(%player_id, error = %e, "request rejected");
        state.send_to_player(player_id, ServerMessage::error(e.code(), &e));
    }
}

async fn dispatch_message(
    player_id: Uuid,
    msg: ClientMessage,
    state: &Arc<ServerState>,
) -> Result<(), RoomError> {
    match msg {
        ClientMessage::CreateMatch {
            game_type,
            player_name,
        } => {
            if state.player_rooms.contains_key(&player_id) {
                return Err(RoomError::AlreadyInMatch);
            }
            let game_type: GameType = game_type
                .parse()
                .map_err(|e: UnsupportedGameType| RegistryError::UnsupportedGameType(e.0))?;
            let game = state.registry.create_match(game_type).await?;
            let room = MatchRoom::new(game, player_id, player_name)?;
            let match_id = room.id;
            let info = room.to_info();

            state.rooms.insert(match_id, Arc::new(Mutex::new(room)));
            state.player_rooms.insert(player_id, match_id);
            info!(%match_id, game = %game_type, "match created");

            state.send_to_player(player_id, ServerMessage::MatchCreated { match_id });
            state.send_to_player(player_id, ServerMessage::JoinedMatch { info });
        }

        ClientMessage::JoinMatch {
            match_id,
            player_name,
        } => {
            if state.player_rooms.contains_key(&player_id) {
                return Err(RoomError::AlreadyInMatch);
            }
            let (info, started) = {
                let handle = state.room(match_id)?;
                let mut room = lock(&handle)?;
                room.add_player(player_id, player_name)?;
                let started = (room.status() == MatchStatus::InProgress)
                    .then(|| room.get_game_state());
                (room.to_info(), started)
            };
            state.player_rooms.insert(player_id, match_id);

            state.send_to_player(player_id, ServerMessage::JoinedMatch { info: info.clone() });
            state.broadcast_to_room_except(
                match_id,
                player_id,
                ServerMessage::MatchUpdated { info },
            );

            // Filling the last seat starts the match
            if let Some(game_state) = started {
                state.publish_game(match_id, game_state, true);
            }
        }

        ClientMessage::LeaveMatch => {
            let room_id = state.room_of(player_id)?;
            leave_room(player_id, room_id, state)?;
            state.send_to_player(player_id, ServerMessage::LeftMatch);
        }

        ClientMessage::StartMatch => {
            let (room_id, game_state) = state.with_room(player_id, |room| room.start_game(player_id))?;
            info!(%room_id, "match started");
            state.publish_game(room_id, game_state, true);
        }

        ClientMessage::GameAction { action } => {
            let (room_id, result) =
                state.with_room(player_id, |room| room.apply_action(player_id, action))?;
            let new_state = result.new_state.clone();
            state.send_to_player(player_id, ServerMessage::ActionResult(result));

            if let Some(game_state) = new_state {
                state.publish_game(room_id, game_state, false);
            }
        }

        ClientMessage::Undo { checkpoint } => {
            let (room_id, game_state) =
                state.with_room(player_id, |room| room.undo(player_id, checkpoint))?;
            info!(%room_id, checkpoint, "checkpoint restored");
            state.publish_game(room_id, game_state, false);
        }

        ClientMessage::TogglePhase => {
            let (room_id, game_state) =
                state.with_room(player_id, |room| room.toggle_phase(player_id))?;
            state.publish_game(room_id, game_state, false);
        }

        ClientMessage::Chat { message } => {
            let (room_id, player_name) = state.with_room(player_id, |room| {
                room.player_name(player_id).ok_or(RoomError::NotInMatch)
            })?;

            state.broadcast_to_room(
                room_id,
                ServerMessage::ChatMessage {
                    player_name,
                    message,
                },
            );
        }

        ClientMessage::ListMatches => {
            let matches = state.get_waiting_rooms();
            state.send_to_player(player_id, ServerMessage::MatchList { matches });
        }

        ClientMessage::EngineStats => {
            let stats = state.registry.get_stats();
            state.send_to_player(player_id, ServerMessage::EngineStats { stats });
        }

        ClientMessage::Ping => {
            state.send_to_player(player_id, ServerMessage::Pong);
        }
    }
    Ok(())
}

/// Take a player out of a match, dropping the match once it is empty
fn leave_room(player_id: Uuid, room_id: Uuid, state: &ServerState) -> Result<(), RoomError> {
    let (is_empty, info) = {
        let handle = state.room(room_id)?;
        let mut room = lock(&handle)?;
        let is_empty = room.remove_player(player_id)?;
        (is_empty, room.to_info())
    };
    state.player_rooms.remove(&player_id);

    if is_empty {
        state.rooms.remove(&room_id);
        debug!(%room_id, "empty match removed");
    } else {
        state.broadcast_to_room(room_id, ServerMessage::MatchUpdated { info });
    }
    Ok(())
}

/// Handle player disconnect.
fn handle_disconnect(player_id: Uuid, state: &Arc<ServerState>) {
    let Ok(room_id) = state.room_of(player_id) else {
        return;
    };
    let handle = state.room(room_id).ok();
    let in_progress = handle.as_ref().and_then(|room| {
        lock(room)
            .ok()
            .map(|room| room.status() != MatchStatus::WaitingForPlayers)
    });

    match (in_progress, handle) {
        // Keep the seat once the match has started
        (Some(true), Some(handle)) => {
            state.player_rooms.remove(&player_id);
            let info = lock(&handle).ok().map(|mut room| {
                room.set_player_connected(player_id, false);
                room.to_info()
            });
            if let Some(info) = info {
                state.broadcast_to_room(room_id, ServerMessage::MatchUpdated { info });
            }
        }
        (Some(false), _) => {
            if let Err(e) = leave_room(player_id, room_id, state) {
                warn!(%player_id, error = %e, "failed to leave match on disconnect");
                state.player_rooms.remove(&player_id);
            }
        }
        _ => {
            state.player_rooms.remove(&player_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::registry::StandardFactory;
    use gamehall_core::{GameRng, PrivateView};
    use serde_json::json;

    fn state() -> Arc<ServerState> {
        let config = ServerConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
            ..ServerConfig::default()
        };
        let registry = EngineRegistry::new(
            StandardFactory,
            config.engine_cache_capacity,
            config.retry,
            GameRng::with_seed(3),
        );
        Arc::new(ServerState::new(config, registry))
    }

    fn connect(state: &ServerState) -> (Uuid, mpsc::UnboundedReceiver<ServerMessage>) {
        let player_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        state.player_senders.insert(player_id, tx);
        (player_id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    async fn create(
        state: &Arc<ServerState>,
        player_id: Uuid,
        rx: &mut mpsc::UnboundedReceiver<ServerMessage>,
        game_type: &str,
    ) -> Uuid {
        handle_message(
            player_id,
            ClientMessage::CreateMatch {
                game_type: game_type.to_string(),
                player_name: "Host".to_string(),
            },
            state,
        )
        .await;
        drain(rx)
            .into_iter()
            .find_map(|msg| match msg {
                ServerMessage::MatchCreated { match_id } => Some(match_id),
                _ => None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_game_type() {
        let state = state();
        let (player, mut rx) = connect(&state);
        handle_message(
            player,
            ClientMessage::CreateMatch {
                game_type: "js_red_alert".to_string(),
                player_name: "Host".to_string(),
            },
            &state,
        )
        .await;

        let msgs = drain(&mut rx);
        assert!(matches!(
            &msgs[..],
            [ServerMessage::Error { code, .. }] if code == "unsupported_game_type"
        ));
        assert!(state.rooms.is_empty());
    }

    #[tokio::test]
    async fn test_join_fills_seats_and_starts() {
        let state = state();
        let (host, mut host_rx) = connect(&state);
        let (guest, mut guest_rx) = connect(&state);
        let match_id = create(&state, host, &mut host_rx, "gomoku").await;

        handle_message(
            guest,
            ClientMessage::JoinMatch {
                match_id,
                player_name: "Guest".to_string(),
            },
            &state,
        )
        .await;

        let host_msgs = drain(&mut host_rx);
        assert!(host_msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::MatchUpdated { .. })));
        assert!(host_msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::GameStarted { .. })));
        assert!(drain(&mut guest_rx).iter().any(|m| matches!(
            m,
            ServerMessage::TurnChanged { seat: 0, player_id: Some(id) } if *id == host
        )));

        handle_message(
            host,
            ClientMessage::GameAction {
                action: json!({"type": "place", "x": 7, "y": 7}),
            },
            &state,
        )
        .await;
        let host_msgs = drain(&mut host_rx);
        assert!(matches!(&host_msgs[0], ServerMessage::ActionResult(r) if r.success));
        assert!(drain(&mut guest_rx).iter().any(|m| matches!(
            m,
            ServerMessage::TurnChanged { seat: 1, player_id: Some(id) } if *id == guest
        )));
    }

    #[tokio::test]
    async fn test_private_views_go_to_their_seat_only() {
        let state = state();
        let (host, mut host_rx) = connect(&state);
        let (guest, mut guest_rx) = connect(&state);
        let match_id = create(&state, host, &mut host_rx, "poker").await;
        handle_message(
            guest,
            ClientMessage::JoinMatch {
                match_id,
                player_name: "Guest".to_string(),
            },
            &state,
        )
        .await;

        // Only the host may start
        handle_message(guest, ClientMessage::StartMatch, &state).await;
        assert!(drain(&mut guest_rx)
            .iter()
            .any(|m| matches!(m, ServerMessage::Error { code, .. } if code == "not_host")));

        drain(&mut host_rx);
        handle_message(host, ClientMessage::StartMatch, &state).await;

        let own_cards = |msgs: Vec<ServerMessage>| -> Vec<_> {
            msgs.into_iter()
                .filter_map(|m| match m {
                    ServerMessage::PrivateState {
                        view: PrivateView::HoleCards { cards },
                    } => Some(cards),
                    _ => None,
                })
                .collect()
        };
        let host_views = own_cards(drain(&mut host_rx));
        let guest_views = own_cards(drain(&mut guest_rx));
        assert_eq!(host_views.len(), 1);
        assert_eq!(guest_views.len(), 1);
        assert_ne!(host_views[0], guest_views[0]);
    }

    #[tokio::test]
    async fn test_fold_ends_match() {
        let state = state();
        let (host, mut host_rx) = connect(&state);
        let (guest, mut guest_rx) = connect(&state);
        let match_id = create(&state, host, &mut host_rx, "poker").await;
        handle_message(
            guest,
            ClientMessage::JoinMatch {
                match_id,
                player_name: "Guest".to_string(),
            },
            &state,
        )
        .await;
        handle_message(host, ClientMessage::StartMatch, &state).await;
        drain(&mut guest_rx);

        handle_message(
            host,
            ClientMessage::GameAction {
                action: json!({"type": "fold"}),
            },
            &state,
        )
        .await;
        assert!(drain(&mut guest_rx).iter().any(|m| matches!(
            m,
            ServerMessage::GameOver { winner: Some(w) } if w.name == "Guest"
        )));
    }

    #[tokio::test]
    async fn test_rejected_action_reports_code() {
        let state = state();
        let (host, mut host_rx) = connect(&state);
        create(&state, host, &mut host_rx, "chess").await;

        handle_message(
            host,
            ClientMessage::GameAction {
                action: json!({"type": "resign"}),
            },
            &state,
        )
        .await;
        let msgs = drain(&mut host_rx);
        assert!(matches!(
            &msgs[..],
            [ServerMessage::ActionResult(r)] if r.error_code.as_deref() == Some("game_not_started")
        ));
    }

    #[tokio::test]
    async fn test_leave_and_disconnect_cleanup() {
        let state = state();
        let (host, mut host_rx) = connect(&state);
        let (guest, _guest_rx) = connect(&state);
        let match_id = create(&state, host, &mut host_rx, "werewolf").await;
        handle_message(
            guest,
            ClientMessage::JoinMatch {
                match_id,
                player_name: "Guest".to_string(),
            },
            &state,
        )
        .await;

        handle_message(host, ClientMessage::LeaveMatch, &state).await;
        assert!(drain(&mut host_rx)
            .iter()
            .any(|m| matches!(m, ServerMessage::LeftMatch)));
        assert_eq!(state.room(match_id).unwrap().lock().unwrap().host_id, guest);

        handle_disconnect(guest, &state);
        assert!(state.rooms.is_empty());
        assert!(state.player_rooms.is_empty());
    }

    #[tokio::test]
    async fn test_idle_matches_are_reaped() {
        let state = state();
        let (host, mut host_rx) = connect(&state);
        create(&state, host, &mut host_rx, "go").await;

        assert_eq!(state.reap_idle_matches(Duration::from_secs(3600)), 0);
        assert_eq!(state.reap_idle_matches(Duration::ZERO), 1);
        assert!(state.rooms.is_empty());
        assert!(state.player_rooms.is_empty());
        assert!(drain(&mut host_rx)
            .iter()
            .any(|m| matches!(m, ServerMessage::Error { code, .. } if code == "match_expired")));
    }

    #[tokio::test]
    async fn test_engine_stats_and_listing() {
        let state = state();
        let (host, mut host_rx) = connect(&state);
        create(&state, host, &mut host_rx, "mahjong").await;

        handle_message(host, ClientMessage::EngineStats, &state).await;
        handle_message(host, ClientMessage::ListMatches, &state).await;
        let msgs = drain(&mut host_rx);

        let ServerMessage::EngineStats { stats } = &msgs[0] else {
            panic!("expected stats, got {:?}", msgs[0]);
        };
        assert!(stats[&GameType::Mahjong].initialized);
        assert!(!stats[&GameType::Chess].initialized);
        assert!(matches!(&msgs[1], ServerMessage::MatchList { matches } if matches.len() == 1));
    }
}
