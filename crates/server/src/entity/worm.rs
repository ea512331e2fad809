//! Worm (player snake) entity.

use crate::math::WorldBounds;
use glam::Vec2;
use std::collections::VecDeque;
use std::f32::consts::TAU;

/// Base movement speed in world units per tick.
pub const BASE_SPEED: f32 = 4.0;
/// Speed multiplier while boosting.
pub const BOOST_MULTIPLIER: f32 = 1.8;
/// Score drained per tick while boosting.
pub const BOOST_COST_PER_TICK: f32 = 0.5;
/// Boosting is funded by score and can never take it below this floor.
pub const BOOST_SCORE_FLOOR: f32 = 10.0;
/// Steering rate in radians per tick.
pub const TURN_SPEED: f32 = 0.12;
/// Score assigned on spawn and respawn.
pub const STARTING_SCORE: f32 = 10.0;

/// Body thickness at and below the body-length cap.
pub const BASE_THICKNESS: f32 = 14.0;
/// Thickness ceiling for very large worms.
pub const MAX_THICKNESS: f32 = 28.0;

const MIN_BODY_LEN: usize = 15;
const MAX_BODY_LEN: usize = 300;
/// Score at which `body_target_len` reaches the cap; thickness grows past it.
const LENGTH_CAP_SCORE: f32 = 375.0;

/// Target body length for a score: `clamp(floor(score * 0.8), 15, 300)`.
#[inline]
pub fn body_target_len(score: f32) -> usize {
    ((score * 0.8).floor() as usize).clamp(MIN_BODY_LEN, MAX_BODY_LEN)
}

/// Thickness for a score: base 14 until the body-length cap, then a linear
/// bonus of 0.1 per score point, capped at 28.
#[inline]
pub fn thickness_for_score(score: f32) -> f32 {
    (BASE_THICKNESS + (score - LENGTH_CAP_SCORE).max(0.0) * 0.1).min(MAX_THICKNESS)
}

/// A player-controlled worm. Owned by exactly one room; created on `hello`
/// in playing mode and removed on disconnect. Respawn resets the same
/// instance in place instead of recreating it.
#[derive(Debug, Clone)]
pub struct Worm {
    pub id: u32,
    pub name: String,
    pub color: String,
    pub avatar: Option<String>,
    pub position: Vec2,
    /// Heading in radians.
    pub angle: f32,
    pub speed: f32,
    /// Trailing segments, most-recent-first; the head is `position`.
    pub body: VecDeque<Vec2>,
    pub score: f32,
    pub alive: bool,
    /// Steering intent: -1, 0 or 1.
    pub turn_intent: i8,
    pub boosting: bool,
    pub thickness: f32,
}

impl Worm {
    /// Spawn a new worm at a random position in `world`.
    pub fn spawn(id: u32, name: String, color: String, avatar: Option<String>, world: WorldBounds) -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        Self {
            id,
            name,
            color,
            avatar,
            position: world.random_position(),
            angle: rng.random_range(0.0..TAU),
            speed: BASE_SPEED,
            body: VecDeque::new(),
            score: STARTING_SCORE,
            alive: true,
            turn_intent: 0,
            boosting: false,
            thickness: BASE_THICKNESS,
        }
    }

    /// Reset a dead worm in place. Identity and room membership are kept.
    pub fn respawn(&mut self, world: WorldBounds) {
        use rand::Rng;
        let mut rng = rand::rng();
        self.position = world.random_position();
        self.angle = rng.random_range(0.0..TAU);
        self.speed = BASE_SPEED;
        self.body.clear();
        self.score = STARTING_SCORE;
        self.alive = true;
        self.turn_intent = 0;
        self.boosting = false;
        self.thickness = BASE_THICKNESS;
    }

    /// Prepend the current position and truncate to the score-derived target
    /// length, then re-derive thickness.
    pub fn grow(&mut self) {
        self.body.push_front(self.position);
        self.body.truncate(body_target_len(self.score));
        self.thickness = thickness_for_score(self.score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_length_literals() {
        assert_eq!(body_target_len(10.0), 15);
        assert_eq!(body_target_len(50.0), 40);
        assert_eq!(body_target_len(500.0), 300);
    }

    #[test]
    fn thickness_literals() {
        assert_eq!(thickness_for_score(100.0), 14.0);
        assert_eq!(thickness_for_score(375.0), 14.0);
        assert_eq!(thickness_for_score(475.0), 24.0);
        assert_eq!(thickness_for_score(1000.0), 28.0);
    }

    #[test]
    fn growth_tracks_score_floor() {
        let world = WorldBounds::new(2000.0, 1200.0);
        let mut worm = Worm::spawn(1, "test".into(), "#fff".into(), None, world);
        for _ in 0..40 {
            worm.grow();
        }
        // score 10 floors the target at 15 segments
        assert_eq!(worm.body.len(), 15);
        assert_eq!(worm.thickness, BASE_THICKNESS);
    }

    #[test]
    fn respawn_resets_in_place() {
        let world = WorldBounds::new(2000.0, 1200.0);
        let mut worm = Worm::spawn(7, "test".into(), "#fff".into(), None, world);
        worm.score = 250.0;
        worm.alive = false;
        worm.boosting = true;
        worm.turn_intent = 1;
        worm.grow();

        worm.respawn(world);
        assert!(worm.alive);
        assert_eq!(worm.score, STARTING_SCORE);
        assert!(worm.body.is_empty());
        assert!(!worm.boosting);
        assert_eq!(worm.turn_intent, 0);
        assert_eq!(worm.thickness, BASE_THICKNESS);
        assert_eq!(worm.id, 7);
    }
}
