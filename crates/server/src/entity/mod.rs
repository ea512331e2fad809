//! Game entities.
//!
//! Worms (player snakes) and the two food variants.

mod food;
mod worm;

pub use food::{BonusFood, BonusKind, Food};
pub use worm::{
    body_target_len, thickness_for_score, Worm, BASE_SPEED, BASE_THICKNESS, BOOST_COST_PER_TICK,
    BOOST_MULTIPLIER, BOOST_SCORE_FLOOR, MAX_THICKNESS, STARTING_SCORE, TURN_SPEED,
};
