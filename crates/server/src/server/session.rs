//! Per-connection protocol state and the shared outbound registry.

use crate::entity::Worm;
use crate::room::{Room, RoomManager};
use protocol::{
    decode_client_message, encode_server_message, ClientMessage, ParticipationMode, ServerMessage,
    WorldView,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const MAX_NAME_LEN: usize = 24;

/// One registered connection's routing data.
struct ConnectionEntry {
    room_id: String,
    mode: ParticipationMode,
    sender: UnboundedSender<Message>,
}

/// All live connections, keyed by connection id. Fan-out goes through the
/// per-connection senders; a send to a closing connection is simply dropped
/// and cleaned up when its task exits.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<u32, ConnectionEntry>>,
    next_id: AtomicU32,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    fn allocate_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn insert(&self, id: u32, entry: ConnectionEntry) {
        self.connections.write().await.insert(id, entry);
    }

    async fn remove(&self, id: u32) {
        self.connections.write().await.remove(&id);
    }

    /// (playing, spectating) member counts for one room.
    pub async fn room_counts(&self, room_id: &str) -> (usize, usize) {
        let connections = self.connections.read().await;
        let mut playing = 0;
        let mut spectating = 0;
        for entry in connections.values().filter(|entry| entry.room_id == room_id) {
            match entry.mode {
                ParticipationMode::Playing => playing += 1,
                ParticipationMode::Spectating => spectating += 1,
            }
        }
        (playing, spectating)
    }

    /// Send a message to every connection bound to `room_id`.
    pub async fn broadcast_to_room(&self, room_id: &str, message: &ServerMessage) {
        let Some(frame) = encode_frame(message) else {
            return;
        };
        let connections = self.connections.read().await;
        for entry in connections.values().filter(|entry| entry.room_id == room_id) {
            let _ = entry.sender.send(frame.clone());
        }
    }

    /// Send a message to every connection, bound or not.
    pub async fn broadcast_all(&self, message: &ServerMessage) {
        let Some(frame) = encode_frame(message) else {
            return;
        };
        let connections = self.connections.read().await;
        for entry in connections.values() {
            let _ = entry.sender.send(frame.clone());
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_frame(message: &ServerMessage) -> Option<Message> {
    match encode_server_message(message) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(error) => {
            warn!(%error, "failed to encode outbound message");
            None
        }
    }
}

/// Where a bound connection lives.
struct Binding {
    room: Arc<Room>,
    mode: ParticipationMode,
}

/// Protocol state for one WebSocket connection. Input messages before the
/// `hello` binds the connection are dropped.
pub struct Session {
    manager: Arc<RoomManager>,
    registry: Arc<ConnectionRegistry>,
    sender: UnboundedSender<Message>,
    id: u32,
    binding: Option<Binding>,
    is_admin: bool,
}

impl Session {
    pub fn new(
        manager: Arc<RoomManager>,
        registry: Arc<ConnectionRegistry>,
        sender: UnboundedSender<Message>,
    ) -> Self {
        let id = registry.allocate_id();
        Self {
            manager,
            registry,
            sender,
            id,
            binding: None,
            is_admin: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Dispatch one inbound text frame. Malformed frames are dropped.
    pub async fn handle_text(&mut self, text: &str) {
        let message = match decode_client_message(text) {
            Ok(message) => message,
            Err(error) => {
                debug!(connection = self.id, %error, "dropping malformed frame");
                return;
            }
        };

        match message {
            ClientMessage::Hello {
                name,
                color,
                avatar,
                room_id,
                mode,
                admin_token,
            } => {
                self.handle_hello(name, color, avatar, room_id, mode, admin_token)
                    .await;
            }
            ClientMessage::Turn { dir } => {
                self.with_worm(|worm| worm.turn_intent = dir).await;
            }
            ClientMessage::Boost { boosting } => {
                self.with_worm(|worm| worm.boosting = boosting).await;
            }
            ClientMessage::Respawn => self.handle_respawn().await,
            ClientMessage::AdminStartTournament { room_ids } => {
                if !self.require_admin() {
                    return;
                }
                let started = self.manager.start_tournament(&room_ids).await;
                if started.is_empty() {
                    self.send(&ServerMessage::Error {
                        message: "no tournament rooms matched".to_owned(),
                    });
                } else {
                    self.send(&ServerMessage::AdminSuccess {
                        message: format!("round started in {}", started.join(", ")),
                    });
                }
            }
            ClientMessage::AdminEndRound { room_id } => {
                if !self.require_admin() {
                    return;
                }
                if self.manager.end_round(&room_id).await {
                    self.send(&ServerMessage::AdminSuccess {
                        message: format!("round ended in {room_id}"),
                    });
                } else {
                    self.send(&ServerMessage::Error {
                        message: format!("unknown tournament room {room_id}"),
                    });
                }
            }
            ClientMessage::AdminResetTournament => {
                if !self.require_admin() {
                    return;
                }
                let reset = self.manager.reset_tournament().await;
                self.send(&ServerMessage::AdminSuccess {
                    message: format!("reset {reset} tournament rooms"),
                });
            }
            ClientMessage::AdminGetRoomStatus => {
                if !self.require_admin() {
                    return;
                }
                let rooms = self.manager.room_status().await;
                self.send(&ServerMessage::RoomStatus { rooms });
            }
        }
    }

    async fn handle_hello(
        &mut self,
        name: String,
        color: String,
        avatar: Option<String>,
        room_id: Option<String>,
        mode: Option<ParticipationMode>,
        admin_token: Option<String>,
    ) {
        if self.binding.is_some() {
            debug!(connection = self.id, "repeated hello ignored");
            return;
        }

        if let Some(token) = admin_token {
            let expected = self.manager.admin_token();
            if !expected.is_empty() && token == expected {
                self.is_admin = true;
                self.send(&ServerMessage::AdminGranted {
                    message: "admin access granted".to_owned(),
                });
            } else {
                debug!(connection = self.id, "admin token rejected");
            }
        }

        let room = self.manager.resolve_room(room_id.as_deref());
        let mut mode = mode.unwrap_or_default();

        // The roster is counted under the same lock the worm is inserted
        // under, so concurrent joins cannot oversubscribe the room. Full
        // rooms still admit the connection, as a spectator.
        let world = {
            let mut state = room.state.write().await;
            if mode == ParticipationMode::Playing
                && state.players.len() >= room.config.max_players
            {
                debug!(
                    connection = self.id,
                    room = %room.config.id,
                    "room full, joining as spectator"
                );
                mode = ParticipationMode::Spectating;
            }
            if mode == ParticipationMode::Playing {
                let worm = Worm::spawn(
                    self.id,
                    sanitize_name(&name),
                    color,
                    avatar,
                    state.world,
                );
                state.players.insert(self.id, worm);
            }
            state.world
        };

        self.registry
            .insert(
                self.id,
                ConnectionEntry {
                    room_id: room.config.id.clone(),
                    mode,
                    sender: self.sender.clone(),
                },
            )
            .await;

        let self_id = (mode == ParticipationMode::Playing).then_some(self.id);
        info!(
            connection = self.id,
            room = %room.config.id,
            spectating = mode == ParticipationMode::Spectating,
            "joined"
        );
        self.binding = Some(Binding { room, mode });
        self.send(&ServerMessage::Welcome {
            self_id,
            world: WorldView {
                width: world.width,
                height: world.height,
            },
        });
    }

    async fn handle_respawn(&self) {
        let Some(binding) = &self.binding else {
            return;
        };
        let mut state = binding.room.state.write().await;
        let world = state.world;
        if let Some(worm) = state.players.get_mut(&self.id) {
            if !worm.alive {
                worm.respawn(world);
            }
        }
    }

    /// Apply an input to this connection's worm, if it has one.
    async fn with_worm(&self, apply: impl FnOnce(&mut Worm)) {
        let Some(binding) = &self.binding else {
            return;
        };
        let mut state = binding.room.state.write().await;
        if let Some(worm) = state.players.get_mut(&self.id) {
            apply(worm);
        }
    }

    fn require_admin(&self) -> bool {
        if self.is_admin {
            return true;
        }
        self.send(&ServerMessage::Error {
            message: "unauthorized".to_owned(),
        });
        false
    }

    fn send(&self, message: &ServerMessage) {
        if let Some(frame) = encode_frame(message) {
            let _ = self.sender.send(frame);
        }
    }

    /// Tear the connection down: unregister and remove the worm.
    pub async fn disconnect(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.room.state.write().await.players.remove(&self.id);
            if binding.mode == ParticipationMode::Playing {
                info!(connection = self.id, room = %binding.room.config.id, "player left");
            }
        }
        self.registry.remove(self.id).await;
    }
}

fn sanitize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return "anonymous".to_owned();
    }
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, GameConfig, RoomCategory, RoomConfig, ServerConfig};
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn small_config() -> Config {
        Config {
            server: ServerConfig {
                admin_token: "hunter2".to_owned(),
                ..ServerConfig::default()
            },
            game: GameConfig::default(),
            rooms: vec![
                RoomConfig {
                    id: "arena".to_owned(),
                    name: "Arena".to_owned(),
                    world_width: 1000.0,
                    world_height: 600.0,
                    max_players: 1,
                    category: RoomCategory::Tournament,
                    locked: false,
                    food_count: 20,
                },
                RoomConfig {
                    id: "lobby".to_owned(),
                    name: "Lobby".to_owned(),
                    world_width: 1000.0,
                    world_height: 600.0,
                    max_players: 4,
                    category: RoomCategory::Casual,
                    locked: false,
                    food_count: 20,
                },
            ],
        }
    }

    fn setup() -> (Arc<RoomManager>, Arc<ConnectionRegistry>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let manager = Arc::new(RoomManager::new(small_config(), registry.clone()).unwrap());
        (manager, registry)
    }

    fn session(
        manager: &Arc<RoomManager>,
        registry: &Arc<ConnectionRegistry>,
    ) -> (Session, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Session::new(manager.clone(), registry.clone(), tx), rx)
    }

    fn next_text(rx: &mut UnboundedReceiver<Message>) -> String {
        match rx.try_recv() {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hello_spawns_a_worm_and_welcomes_with_self_id() {
        let (manager, registry) = setup();
        let (mut session, mut rx) = session(&manager, &registry);

        session
            .handle_text(r##"{"type":"hello","name":"alice","color":"#f00","roomId":"arena"}"##)
            .await;

        let welcome = next_text(&mut rx);
        assert!(welcome.contains(r#""type":"welcome""#));
        assert!(welcome.contains(&format!(r#""selfId":{}"#, session.id())));

        let room = manager.room("arena").unwrap();
        let state = room.state.read().await;
        assert!(state.players.contains_key(&session.id()));
        assert_eq!(state.players[&session.id()].name, "alice");
    }

    #[tokio::test]
    async fn spectators_get_no_worm_and_no_self_id() {
        let (manager, registry) = setup();
        let (mut session, mut rx) = session(&manager, &registry);

        session
            .handle_text(
                r##"{"type":"hello","name":"watcher","color":"#0f0","roomId":"arena","mode":"spectating"}"##,
            )
            .await;

        let welcome = next_text(&mut rx);
        assert!(welcome.contains(r#""type":"welcome""#));
        assert!(!welcome.contains("selfId"));

        let room = manager.room("arena").unwrap();
        assert!(room.state.read().await.players.is_empty());
        assert_eq!(registry.room_counts("arena").await, (0, 1));
    }

    #[tokio::test]
    async fn a_full_room_downgrades_joins_to_spectating() {
        let (manager, registry) = setup();
        let (mut first, _rx1) = session(&manager, &registry);
        first
            .handle_text(r##"{"type":"hello","name":"a","color":"#f00","roomId":"arena"}"##)
            .await;

        let (mut second, mut rx2) = session(&manager, &registry);
        second
            .handle_text(r##"{"type":"hello","name":"b","color":"#00f","roomId":"arena"}"##)
            .await;

        let welcome = next_text(&mut rx2);
        assert!(!welcome.contains("selfId"));
        assert_eq!(registry.room_counts("arena").await, (1, 1));
        let room = manager.room("arena").unwrap();
        assert_eq!(room.state.read().await.players.len(), 1);
    }

    #[tokio::test]
    async fn capacity_counts_the_room_roster_not_the_registry() {
        let (manager, registry) = setup();
        let room = manager.room("arena").unwrap();
        // A join that holds a roster slot but has not registered yet.
        {
            let mut state = room.state.write().await;
            let world = state.world;
            state
                .players
                .insert(99, Worm::spawn(99, "racer".into(), "#123".into(), None, world));
        }
        assert_eq!(registry.room_counts("arena").await, (0, 0));

        let (mut session, mut rx) = session(&manager, &registry);
        session
            .handle_text(r##"{"type":"hello","name":"late","color":"#f00","roomId":"arena"}"##)
            .await;

        let welcome = next_text(&mut rx);
        assert!(!welcome.contains("selfId"));
        assert_eq!(room.state.read().await.players.len(), 1);
    }

    #[tokio::test]
    async fn inputs_before_hello_are_dropped_silently() {
        let (manager, registry) = setup();
        let (mut session, mut rx) = session(&manager, &registry);

        session.handle_text(r#"{"type":"turn","dir":1}"#).await;
        session.handle_text(r#"{"type":"boost","boosting":true}"#).await;
        session.handle_text(r#"{"type":"respawn"}"#).await;
        session.handle_text("not json at all").await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn turn_and_boost_reach_the_bound_worm() {
        let (manager, registry) = setup();
        let (mut session, _rx) = session(&manager, &registry);
        session
            .handle_text(r##"{"type":"hello","name":"a","color":"#f00","roomId":"arena"}"##)
            .await;

        session.handle_text(r#"{"type":"turn","dir":-1}"#).await;
        session.handle_text(r#"{"type":"boost","boosting":true}"#).await;

        let room = manager.room("arena").unwrap();
        let state = room.state.read().await;
        let worm = &state.players[&session.id()];
        assert_eq!(worm.turn_intent, -1);
        assert!(worm.boosting);
    }

    #[tokio::test]
    async fn out_of_range_turn_directions_are_rejected() {
        let (manager, registry) = setup();
        let (mut session, _rx) = session(&manager, &registry);
        session
            .handle_text(r##"{"type":"hello","name":"a","color":"#f00","roomId":"arena"}"##)
            .await;

        session.handle_text(r#"{"type":"turn","dir":3}"#).await;

        let room = manager.room("arena").unwrap();
        assert_eq!(room.state.read().await.players[&session.id()].turn_intent, 0);
    }

    #[tokio::test]
    async fn respawn_only_revives_dead_worms() {
        let (manager, registry) = setup();
        let (mut session, _rx) = session(&manager, &registry);
        session
            .handle_text(r##"{"type":"hello","name":"a","color":"#f00","roomId":"arena"}"##)
            .await;

        let room = manager.room("arena").unwrap();
        {
            let mut state = room.state.write().await;
            let worm = state.players.get_mut(&session.id()).unwrap();
            worm.score = 55.0;
        }
        // alive: respawn is a no-op
        session.handle_text(r#"{"type":"respawn"}"#).await;
        assert_eq!(
            room.state.read().await.players[&session.id()].score,
            55.0
        );

        room.state
            .write()
            .await
            .players
            .get_mut(&session.id())
            .unwrap()
            .alive = false;
        session.handle_text(r#"{"type":"respawn"}"#).await;
        let state = room.state.read().await;
        let worm = &state.players[&session.id()];
        assert!(worm.alive);
        assert_eq!(worm.score, crate::entity::STARTING_SCORE);
    }

    #[tokio::test]
    async fn admin_commands_require_the_token() {
        let (manager, registry) = setup();
        let (mut session, mut rx) = session(&manager, &registry);
        session
            .handle_text(r##"{"type":"hello","name":"a","color":"#f00"}"##)
            .await;
        let _welcome = next_text(&mut rx);

        session.handle_text(r#"{"type":"admin:resetTournament"}"#).await;
        let reply = next_text(&mut rx);
        assert!(reply.contains(r#""type":"error""#));
        assert!(reply.contains("unauthorized"));
    }

    #[tokio::test]
    async fn the_admin_token_grants_access_to_admin_operations() {
        let (manager, registry) = setup();
        let (mut session, mut rx) = session(&manager, &registry);
        session
            .handle_text(
                r##"{"type":"hello","name":"op","color":"#fff","adminToken":"hunter2"}"##,
            )
            .await;

        let granted = next_text(&mut rx);
        assert!(granted.contains(r#""type":"adminGranted""#));
        let _welcome = next_text(&mut rx);

        session
            .handle_text(r#"{"type":"admin:startTournament","roomIds":["arena"]}"#)
            .await;
        let reply = next_text(&mut rx);
        assert!(reply.contains(r#""type":"adminSuccess""#));

        session.handle_text(r#"{"type":"admin:getRoomStatus"}"#).await;
        let status = next_text(&mut rx);
        assert!(status.contains(r#""type":"roomStatus""#));
        assert!(status.contains(r#""id":"arena""#));
    }

    #[tokio::test]
    async fn a_wrong_admin_token_is_ignored() {
        let (manager, registry) = setup();
        let (mut session, mut rx) = session(&manager, &registry);
        session
            .handle_text(
                r##"{"type":"hello","name":"op","color":"#fff","adminToken":"wrong"}"##,
            )
            .await;

        let welcome = next_text(&mut rx);
        assert!(welcome.contains(r#""type":"welcome""#));
        session.handle_text(r#"{"type":"admin:resetTournament"}"#).await;
        assert!(next_text(&mut rx).contains("unauthorized"));
    }

    #[tokio::test]
    async fn disconnect_removes_the_worm_and_the_registry_entry() {
        let (manager, registry) = setup();
        let (mut session, _rx) = session(&manager, &registry);
        session
            .handle_text(r##"{"type":"hello","name":"a","color":"#f00","roomId":"arena"}"##)
            .await;
        assert_eq!(registry.room_counts("arena").await, (1, 0));

        session.disconnect().await;

        assert_eq!(registry.room_counts("arena").await, (0, 0));
        let room = manager.room("arena").unwrap();
        assert!(room.state.read().await.players.is_empty());
    }

    #[tokio::test]
    async fn broadcasts_only_reach_the_named_room() {
        let (manager, registry) = setup();
        let (mut in_arena, mut rx_arena) = session(&manager, &registry);
        in_arena
            .handle_text(r##"{"type":"hello","name":"a","color":"#f00","roomId":"arena"}"##)
            .await;
        let (mut in_lobby, mut rx_lobby) = session(&manager, &registry);
        in_lobby
            .handle_text(r##"{"type":"hello","name":"b","color":"#00f","roomId":"lobby"}"##)
            .await;
        let _ = next_text(&mut rx_arena);
        let _ = next_text(&mut rx_lobby);

        registry
            .broadcast_to_room(
                "arena",
                &ServerMessage::Error {
                    message: "arena only".to_owned(),
                },
            )
            .await;

        assert!(next_text(&mut rx_arena).contains("arena only"));
        assert!(rx_lobby.try_recv().is_err());
    }

    #[test]
    fn names_are_trimmed_defaulted_and_capped() {
        assert_eq!(sanitize_name("  alice  "), "alice");
        assert_eq!(sanitize_name("   "), "anonymous");
        assert_eq!(sanitize_name(&"x".repeat(60)).chars().count(), MAX_NAME_LEN);
    }
}
