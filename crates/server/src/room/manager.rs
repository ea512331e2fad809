//! Owns every room and drives their fixed-rate loops.

use super::{now_millis, Room, RoomState};
use crate::config::Config;
use crate::entity::BASE_THICKNESS;
use crate::server::session::ConnectionRegistry;
use protocol::{
    BonusFoodView, HeadView, PlayerView, RoomStatusEntry, ServerMessage, SnapshotView,
    TournamentTimer, TournamentWinner, WorldView,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct RoomManager {
    config: Config,
    rooms: Vec<Arc<Room>>,
    registry: Arc<ConnectionRegistry>,
}

impl RoomManager {
    pub fn new(config: Config, registry: Arc<ConnectionRegistry>) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.rooms.is_empty(), "no rooms configured");
        let rooms = config
            .rooms
            .iter()
            .map(|room| Arc::new(Room::new(room.clone(), &config.game)))
            .collect();
        Ok(Self {
            config,
            rooms,
            registry,
        })
    }

    pub fn rooms(&self) -> &[Arc<Room>] {
        &self.rooms
    }

    pub fn room(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.iter().find(|room| room.config.id == id).cloned()
    }

    /// Room a `hello` lands in. Unknown ids and locked rooms fall back to
    /// the casual room (or the first room if none is casual).
    pub fn resolve_room(&self, requested: Option<&str>) -> Arc<Room> {
        if let Some(id) = requested {
            if let Some(room) = self.room(id) {
                if !room.config.locked {
                    return room;
                }
                debug!(room = id, "join rejected for locked room, falling back");
            }
        }
        self.fallback_room()
    }

    fn fallback_room(&self) -> Arc<Room> {
        let fallback = self.config.default_room();
        self.rooms
            .iter()
            .find(|room| room.config.id == fallback.id)
            .unwrap_or(&self.rooms[0])
            .clone()
    }

    pub fn admin_token(&self) -> &str {
        &self.config.server.admin_token
    }

    /// Spawn the per-room simulation loops and the room-directory loop.
    pub fn start(self: &Arc<Self>) {
        for room in &self.rooms {
            tokio::spawn(run_room_loop(
                room.clone(),
                self.registry.clone(),
                Duration::from_millis(self.config.server.tick_interval_ms),
                Duration::from_millis(self.config.server.broadcast_interval_ms),
            ));
        }
        tokio::spawn(run_status_loop(
            self.clone(),
            Duration::from_millis(self.config.server.room_status_interval_ms),
        ));
    }

    /// One directory entry per room, in configuration order.
    pub async fn room_status(&self) -> Vec<RoomStatusEntry> {
        let mut entries = Vec::with_capacity(self.rooms.len());
        for room in &self.rooms {
            let phase = room.state.read().await.phase;
            let (playing, spectating) = self.registry.room_counts(&room.config.id).await;
            entries.push(RoomStatusEntry {
                id: room.config.id.clone(),
                name: room.config.name.clone(),
                room_type: room.config.category.as_str().to_owned(),
                state: phase.as_str().to_owned(),
                player_count: playing,
                spectator_count: spectating,
                max_players: room.config.max_players,
                locked: room.config.locked,
            });
        }
        entries
    }

    /// Start a round in each named tournament room. Returns the ids that
    /// actually started.
    pub async fn start_tournament(&self, room_ids: &[String]) -> Vec<String> {
        let now = now_millis();
        let mut started = Vec::new();
        for id in room_ids {
            let Some(room) = self.room(id) else {
                warn!(room = %id, "start requested for unknown room");
                continue;
            };
            if !room.is_tournament() {
                warn!(room = %id, "start requested for non-tournament room");
                continue;
            }
            room.state.write().await.start_round(now);
            info!(room = %id, "tournament round started");
            started.push(id.clone());
        }
        started
    }

    /// End a tournament room's round immediately. Returns false for unknown
    /// or non-tournament rooms.
    pub async fn end_round(&self, room_id: &str) -> bool {
        let Some(room) = self.room(room_id) else {
            return false;
        };
        if !room.is_tournament() {
            return false;
        }
        room.state.write().await.force_finish();
        info!(room = room_id, "round ended by admin");
        true
    }

    /// Reset every tournament room back to waiting.
    pub async fn reset_tournament(&self) -> usize {
        let mut reset = 0;
        for room in self.rooms.iter().filter(|room| room.is_tournament()) {
            room.state.write().await.reset_round();
            reset += 1;
        }
        info!(rooms = reset, "tournament reset");
        reset
    }
}

/// Fixed-rate simulation loop for one room. Snapshots go out on the
/// broadcast cadence, or immediately when a tick produced deaths.
async fn run_room_loop(
    room: Arc<Room>,
    registry: Arc<ConnectionRegistry>,
    tick_interval: Duration,
    broadcast_interval: Duration,
) {
    let mut timer = interval_at(Instant::now() + tick_interval, tick_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_broadcast = Instant::now();

    info!(room = %room.config.id, "room loop started");
    loop {
        timer.tick().await;
        let now = now_millis();

        // Build the outbound frame while holding the lock, send after.
        let message = {
            let mut state = room.state.write().await;
            let outcome = state.step(now);
            if should_broadcast(last_broadcast.elapsed(), broadcast_interval, &outcome.deaths) {
                last_broadcast = Instant::now();
                Some(ServerMessage::State {
                    snapshot: state.build_snapshot(now, outcome.deaths),
                })
            } else {
                None
            }
        };

        if let Some(message) = message {
            registry.broadcast_to_room(&room.config.id, &message).await;
        }
    }
}

/// Whether a tick's snapshot goes out: on the throttle cadence, or
/// immediately when the tick produced deaths.
fn should_broadcast(elapsed: Duration, interval: Duration, deaths: &[u32]) -> bool {
    elapsed >= interval || !deaths.is_empty()
}

/// Periodic room directory, pushed to every connection.
async fn run_status_loop(manager: Arc<RoomManager>, interval: Duration) {
    let mut timer = interval_at(Instant::now() + interval, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        timer.tick().await;
        let rooms = manager.room_status().await;
        manager
            .registry
            .broadcast_all(&ServerMessage::RoomStatus { rooms })
            .await;
    }
}

impl RoomState {
    /// Project the state into the wire snapshot. `deaths` is this tick's
    /// death list; optional player fields are omitted at their defaults.
    pub fn build_snapshot(&self, now_ms: i64, deaths: Vec<u32>) -> SnapshotView {
        SnapshotView {
            t: self.tick,
            world: WorldView {
                width: self.world.width,
                height: self.world.height,
            },
            players: self.players.values().map(player_view).collect(),
            foods: self.foods.iter().map(|food| food.pos).collect(),
            bonus_food: self
                .bonus_food
                .iter()
                .map(|bonus| BonusFoodView {
                    pos: bonus.pos,
                    kind: bonus.kind.as_str().to_owned(),
                    value: bonus.value(),
                })
                .collect(),
            dead: deaths,
            tournament_timer: self
                .round_timer(now_ms)
                .map(|(remaining, duration)| TournamentTimer {
                    remaining,
                    duration,
                }),
            tournament_winner: self.winner.as_ref().map(|winner| TournamentWinner {
                name: winner.name.clone(),
                score: winner.score,
            }),
        }
    }
}

fn player_view(worm: &crate::entity::Worm) -> PlayerView {
    PlayerView {
        id: worm.id,
        name: worm.name.clone(),
        color: worm.color.clone(),
        avatar: worm.avatar.clone(),
        head: HeadView {
            pos: worm.position,
            angle: worm.angle,
        },
        body: worm.body.iter().copied().collect(),
        score: worm.score,
        alive: worm.alive,
        boosting: worm.boosting.then_some(true),
        thickness: (worm.thickness > BASE_THICKNESS).then_some(worm.thickness),
    }
}
