//! Per-room simulation step.
//!
//! Each tick runs the phases below in a fixed order; the ordering is load
//! bearing (growth runs before collision so a worm that dies this tick still
//! contributed a full body to the grid).

use super::RoomState;
use crate::entity::{
    BonusFood, Food, BASE_SPEED, BOOST_COST_PER_TICK, BOOST_MULTIPLIER, BOOST_SCORE_FLOOR,
    TURN_SPEED,
};
use crate::math::distance_squared;
use crate::spatial::SegmentGrid;
use glam::Vec2;
use rand::Rng;
use std::f32::consts::TAU;

/// Squared pickup radius for both food kinds (18 units).
pub const FOOD_RADIUS_SQ: f32 = 18.0 * 18.0;
/// Squared kill radius for head-vs-segment and head-vs-head (14 units).
pub const HEAD_RADIUS_SQ: f32 = 14.0 * 14.0;
/// A worm's own first segments never kill it (neck tolerance).
pub const SELF_HINGE: usize = 6;

/// Plain food hard cap, and the level cleanup trims back down to.
const FOOD_CAP: usize = 400;
const FOOD_CAP_RETAIN: usize = FOOD_CAP - 50;

/// At most this many body segments feed the death scatter.
const BURST_BODY_LIMIT: usize = 150;
/// At most this many bonus points ring a death position.
const BURST_BONUS_LIMIT: usize = 25;

/// What a single tick produced.
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Worms that died this tick. A non-empty list forces an immediate
    /// snapshot broadcast regardless of the throttle window.
    pub deaths: Vec<u32>,
}

impl RoomState {
    /// Run one full simulation tick.
    pub fn step(&mut self, now_ms: i64) -> TickOutcome {
        self.tick += 1;
        self.apply_movement();
        self.apply_growth();
        self.consume_plain_food();
        self.consume_bonus_food();
        let mut deaths = self.resolve_body_collisions();
        self.resolve_head_collisions(&mut deaths);
        self.maintain_food_population();
        self.update_phase(now_ms);
        TickOutcome { deaths }
    }

    /// Phase 1: steering, boost economy, position update.
    pub(crate) fn apply_movement(&mut self) {
        let world = self.world;
        for worm in self.players.values_mut().filter(|worm| worm.alive) {
            worm.angle += f32::from(worm.turn_intent) * TURN_SPEED;

            if worm.boosting && worm.score > BOOST_SCORE_FLOOR {
                worm.speed = BASE_SPEED * BOOST_MULTIPLIER;
                worm.score -= BOOST_COST_PER_TICK;
                if worm.score <= BOOST_SCORE_FLOOR {
                    worm.score = BOOST_SCORE_FLOOR;
                    worm.boosting = false;
                }
            } else {
                worm.speed = BASE_SPEED;
                worm.boosting = false;
            }

            let direction = Vec2::new(worm.angle.cos(), worm.angle.sin());
            worm.position = world.wrap_point(worm.position + direction * worm.speed);
        }
    }

    /// Phase 2: prepend the head and truncate to the score-derived length.
    pub(crate) fn apply_growth(&mut self) {
        for worm in self.players.values_mut().filter(|worm| worm.alive) {
            worm.grow();
        }
    }

    /// Phase 3: plain food pickup. The first matching worm in id order wins
    /// a contested point; the point respawns in place at a new random spot.
    pub(crate) fn consume_plain_food(&mut self) {
        let world = self.world;
        for food in &mut self.foods {
            let eater = self.players.values_mut().find(|worm| {
                worm.alive && distance_squared(worm.position, food.pos, world) <= FOOD_RADIUS_SQ
            });
            if let Some(worm) = eater {
                worm.score += 1.0;
                food.pos = world.random_position();
            }
        }
    }

    /// Phase 4: bonus food pickup. Consumed points respawn with a resampled
    /// kind, unless the population is above target (death-burst surplus),
    /// in which case they simply disappear.
    pub(crate) fn consume_bonus_food(&mut self) {
        let world = self.world;
        let target = self.bonus_food_target();
        let mut rng = rand::rng();
        let mut index = 0;
        while index < self.bonus_food.len() {
            let pos = self.bonus_food[index].pos;
            let value = self.bonus_food[index].value();
            let eater = self.players.values_mut().find(|worm| {
                worm.alive && distance_squared(worm.position, pos, world) <= FOOD_RADIUS_SQ
            });
            match eater {
                Some(worm) => {
                    worm.score += value;
                    if self.bonus_food.len() <= target {
                        self.bonus_food[index] =
                            BonusFood::at(world.random_position(), &mut rng);
                        index += 1;
                    } else {
                        self.bonus_food.swap_remove(index);
                    }
                }
                None => index += 1,
            }
        }
    }

    /// Phase 5: head-vs-body collision via the per-tick grid. Self segments
    /// inside the hinge window are skipped so a worm's own neck never kills
    /// it. Returns this phase's deaths.
    pub(crate) fn resolve_body_collisions(&mut self) -> Vec<u32> {
        let world = self.world;
        let mut grid = SegmentGrid::new(world);
        for (&id, worm) in &self.players {
            if !worm.alive {
                continue;
            }
            for (index, &segment) in worm.body.iter().enumerate() {
                grid.insert(segment, id, index);
            }
        }

        let mut deaths = Vec::new();
        for (&id, worm) in &self.players {
            if !worm.alive {
                continue;
            }
            let hit = grid.query_nearby(worm.position).any(|segment| {
                if segment.owner == id && segment.index < SELF_HINGE {
                    return false;
                }
                distance_squared(worm.position, segment.pos, world) <= HEAD_RADIUS_SQ
            });
            if hit {
                deaths.push(id);
            }
        }

        for &id in &deaths {
            self.kill_worm(id);
        }
        deaths
    }

    /// Phase 6: pairwise head-to-head among still-living worms; both heads
    /// of a colliding pair die in the same tick. Plain pairwise scan; room
    /// populations are small.
    pub(crate) fn resolve_head_collisions(&mut self, deaths: &mut Vec<u32>) {
        let world = self.world;
        let heads: Vec<(u32, Vec2)> = self
            .players
            .iter()
            .filter(|(_, worm)| worm.alive)
            .map(|(&id, worm)| (id, worm.position))
            .collect();

        let mut colliding = Vec::new();
        for i in 0..heads.len() {
            for j in (i + 1)..heads.len() {
                if distance_squared(heads[i].1, heads[j].1, world) <= HEAD_RADIUS_SQ {
                    colliding.push(heads[i].0);
                    colliding.push(heads[j].0);
                }
            }
        }

        for id in colliding {
            if self.kill_worm(id) {
                deaths.push(id);
            }
        }
    }

    /// Phase 7: population maintenance. Tops plain/bonus food back up to
    /// target, and trims a burst-inflated plain population by discarding the
    /// points farthest from any living worm.
    pub(crate) fn maintain_food_population(&mut self) {
        let world = self.world;
        while self.foods.len() < self.plain_food_target() {
            self.foods.push(Food::random(world));
        }
        while self.bonus_food.len() < self.bonus_food_target() {
            self.bonus_food.push(BonusFood::random(world));
        }

        if self.foods.len() > FOOD_CAP {
            let heads: Vec<Vec2> = self
                .players
                .values()
                .filter(|worm| worm.alive)
                .map(|worm| worm.position)
                .collect();
            if heads.is_empty() {
                self.foods.truncate(FOOD_CAP_RETAIN);
            } else {
                // Keep the points nearest to a living worm.
                self.foods.sort_by(|a, b| {
                    let da = nearest_distance_squared(a.pos, &heads, world);
                    let db = nearest_distance_squared(b.pos, &heads, world);
                    da.total_cmp(&db)
                });
                self.foods.truncate(FOOD_CAP_RETAIN);
            }
        }
    }

    /// Mark a worm dead and scatter its food burst. Returns false if it was
    /// already dead (a worm can only die once per tick).
    pub(crate) fn kill_worm(&mut self, id: u32) -> bool {
        let Some(worm) = self.players.get_mut(&id) else {
            return false;
        };
        if !worm.alive {
            return false;
        }
        worm.alive = false;
        worm.boosting = false;
        worm.turn_intent = 0;
        let body: Vec<Vec2> = worm.body.iter().copied().collect();
        let score = worm.score;
        let position = worm.position;
        self.emit_death_burst(&body, score, position);
        true
    }

    /// Scatter plain food along every third retained body segment and a
    /// ring of bonus food around the death position.
    pub(crate) fn emit_death_burst(&mut self, body: &[Vec2], score: f32, position: Vec2) {
        let world = self.world;
        let mut rng = rand::rng();

        let retained = body.len().min(BURST_BODY_LIMIT);
        let segment_food = retained / 3;
        for i in 0..segment_food {
            let jitter = Vec2::new(rng.random_range(-8.0..8.0), rng.random_range(-8.0..8.0));
            self.foods.push(Food {
                pos: world.wrap_point(body[i * 3] + jitter),
            });
        }

        let bonus_count = ((score / 8.0).floor() as usize).min(BURST_BONUS_LIMIT);
        for i in 0..bonus_count {
            let angle = i as f32 / bonus_count as f32 * TAU;
            let radius = rng.random_range(60.0..100.0);
            let offset = Vec2::new(angle.cos(), angle.sin()) * radius;
            self.bonus_food
                .push(BonusFood::at(world.wrap_point(position + offset), &mut rng));
        }
    }
}

fn nearest_distance_squared(point: Vec2, heads: &[Vec2], world: crate::math::WorldBounds) -> f32 {
    heads
        .iter()
        .map(|&head| distance_squared(point, head, world))
        .fold(f32::INFINITY, f32::min)
}
