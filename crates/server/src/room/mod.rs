//! Rooms: per-room state, the tournament state machine, and the manager
//! that drives each room's fixed-rate loop.

use crate::config::{GameConfig, RoomCategory, RoomConfig};
use crate::entity::{BonusFood, Food, Worm};
use crate::math::WorldBounds;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

mod manager;
pub mod sim;

pub use manager::RoomManager;

/// Milliseconds since the unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Room lifecycle phase.
///
/// Tournament rooms walk `Waiting -> Countdown -> Active -> Finished`;
/// casual rooms sit permanently in `Freeplay`. The simulation tick itself is
/// unconditional; only timer and overlay semantics depend on the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Waiting,
    Countdown,
    Active,
    Finished,
    Freeplay,
}

impl RoomPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomPhase::Waiting => "waiting",
            RoomPhase::Countdown => "countdown",
            RoomPhase::Active => "active",
            RoomPhase::Finished => "finished",
            RoomPhase::Freeplay => "freeplay",
        }
    }
}

/// The winner recorded when a round ends.
#[derive(Debug, Clone)]
pub struct RoundWinner {
    pub name: String,
    pub score: f32,
}

/// Mutable per-room state. Exclusively owned by its room; the tick loop and
/// the gateway serialize access through the room's lock.
#[derive(Debug)]
pub struct RoomState {
    pub world: WorldBounds,
    /// Playing worms by id. A `BTreeMap` so that "first match wins" rules
    /// (food consumption, winner tie-break) follow a deterministic order.
    pub players: BTreeMap<u32, Worm>,
    pub foods: Vec<Food>,
    pub bonus_food: Vec<BonusFood>,
    pub phase: RoomPhase,
    /// End of the pre-round countdown, set by `start_round`.
    countdown_ends_at: Option<i64>,
    /// Round timer origin, armed when the countdown promotes to `Active`.
    pub round_started_at: Option<i64>,
    pub round_duration_ms: i64,
    countdown_ms: i64,
    pub winner: Option<RoundWinner>,
    /// Plain food population target; bonus food is held at 20% of it.
    plain_food_target: usize,
    bonus_food_target: usize,
    pub tick: u64,
}

impl RoomState {
    pub fn new(config: &RoomConfig, game: &GameConfig) -> Self {
        let world = WorldBounds::new(config.world_width, config.world_height);
        let plain_food_target = config.food_count;
        let bonus_food_target = plain_food_target / 5;
        let foods = (0..plain_food_target).map(|_| Food::random(world)).collect();
        let bonus_food = (0..bonus_food_target)
            .map(|_| BonusFood::random(world))
            .collect();
        Self {
            world,
            players: BTreeMap::new(),
            foods,
            bonus_food,
            phase: match config.category {
                RoomCategory::Tournament => RoomPhase::Waiting,
                RoomCategory::Casual => RoomPhase::Freeplay,
            },
            countdown_ends_at: None,
            round_started_at: None,
            round_duration_ms: (game.round_duration_secs * 1000) as i64,
            countdown_ms: (game.countdown_secs * 1000) as i64,
            winner: None,
            plain_food_target,
            bonus_food_target,
            tick: 0,
        }
    }

    pub fn plain_food_target(&self) -> usize {
        self.plain_food_target
    }

    pub fn bonus_food_target(&self) -> usize {
        self.bonus_food_target
    }

    /// Arm the pre-round countdown and clear any previous winner.
    pub fn start_round(&mut self, now_ms: i64) {
        self.winner = None;
        self.round_started_at = None;
        self.countdown_ends_at = Some(now_ms + self.countdown_ms);
        self.phase = RoomPhase::Countdown;
    }

    /// Force the round to end immediately, recording the current winner.
    pub fn force_finish(&mut self) {
        self.finish_round();
    }

    /// Back to `Waiting`, clearing timers and the winner record.
    pub fn reset_round(&mut self) {
        self.phase = RoomPhase::Waiting;
        self.countdown_ends_at = None;
        self.round_started_at = None;
        self.winner = None;
    }

    /// Advance the phase machine. Freeplay rooms never transition.
    pub(crate) fn update_phase(&mut self, now_ms: i64) {
        match self.phase {
            RoomPhase::Countdown => {
                if self
                    .countdown_ends_at
                    .is_some_and(|ends_at| now_ms >= ends_at)
                {
                    self.countdown_ends_at = None;
                    self.round_started_at = Some(now_ms);
                    self.phase = RoomPhase::Active;
                }
            }
            RoomPhase::Active => {
                if self
                    .round_started_at
                    .is_some_and(|started| now_ms - started >= self.round_duration_ms)
                {
                    self.finish_round();
                }
            }
            RoomPhase::Waiting | RoomPhase::Finished | RoomPhase::Freeplay => {}
        }
    }

    fn finish_round(&mut self) {
        // First max in ascending id order wins ties.
        let mut best: Option<&Worm> = None;
        for worm in self.players.values().filter(|worm| worm.alive) {
            if best.is_none_or(|current| worm.score > current.score) {
                best = Some(worm);
            }
        }
        self.winner = best.map(|worm| RoundWinner {
            name: worm.name.clone(),
            score: worm.score,
        });
        self.round_started_at = None;
        self.countdown_ends_at = None;
        self.phase = RoomPhase::Finished;
    }

    /// Remaining/total round time while a round is active.
    pub fn round_timer(&self, now_ms: i64) -> Option<(i64, i64)> {
        let started = self.round_started_at?;
        if self.phase != RoomPhase::Active {
            return None;
        }
        let remaining = (self.round_duration_ms - (now_ms - started)).max(0);
        Some((remaining, self.round_duration_ms))
    }
}

/// One arena room. Created at startup, never destroyed.
#[derive(Debug)]
pub struct Room {
    pub config: RoomConfig,
    pub state: RwLock<RoomState>,
}

impl Room {
    pub fn new(config: RoomConfig, game: &GameConfig) -> Self {
        let state = RoomState::new(&config, game);
        Self {
            config,
            state: RwLock::new(state),
        }
    }

    pub fn is_tournament(&self) -> bool {
        self.config.category == RoomCategory::Tournament
    }
}
