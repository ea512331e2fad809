//! Food entities.

use crate::math::WorldBounds;
use glam::Vec2;
use rand::Rng;

/// A plain food point worth +1 score.
#[derive(Debug, Clone, Copy)]
pub struct Food {
    pub pos: Vec2,
}

impl Food {
    pub fn random(world: WorldBounds) -> Self {
        Self {
            pos: world.random_position(),
        }
    }
}

/// Bonus food rarity. Drawn from a fixed weighted distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusKind {
    Common,
    Uncommon,
    Rare,
}

impl BonusKind {
    /// Sample a kind: 70% common, 25% uncommon, 5% rare.
    pub fn sample(rng: &mut impl Rng) -> Self {
        let roll: f32 = rng.random();
        if roll < 0.70 {
            BonusKind::Common
        } else if roll < 0.95 {
            BonusKind::Uncommon
        } else {
            BonusKind::Rare
        }
    }

    /// Score awarded when consumed.
    pub fn value(self) -> f32 {
        match self {
            BonusKind::Common => 5.0,
            BonusKind::Uncommon => 10.0,
            BonusKind::Rare => 25.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BonusKind::Common => "common",
            BonusKind::Uncommon => "uncommon",
            BonusKind::Rare => "rare",
        }
    }
}

/// Bonus food worth its kind's value.
#[derive(Debug, Clone, Copy)]
pub struct BonusFood {
    pub pos: Vec2,
    pub kind: BonusKind,
}

impl BonusFood {
    pub fn random(world: WorldBounds) -> Self {
        let mut rng = rand::rng();
        Self {
            pos: world.random_position(),
            kind: BonusKind::sample(&mut rng),
        }
    }

    pub fn at(pos: Vec2, rng: &mut impl Rng) -> Self {
        Self {
            pos,
            kind: BonusKind::sample(rng),
        }
    }

    pub fn value(&self) -> f32 {
        self.kind.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_values_are_tied_to_rarity() {
        assert_eq!(BonusKind::Common.value(), 5.0);
        assert_eq!(BonusKind::Uncommon.value(), 10.0);
        assert_eq!(BonusKind::Rare.value(), 25.0);
    }

    #[test]
    fn sampled_kinds_cover_the_distribution() {
        let mut rng = rand::rng();
        let mut seen_common = false;
        for _ in 0..1000 {
            match BonusKind::sample(&mut rng) {
                BonusKind::Common => seen_common = true,
                BonusKind::Uncommon | BonusKind::Rare => {}
            }
        }
        // 1000 draws at 70% each: common is effectively guaranteed
        assert!(seen_common);
    }

    #[test]
    fn random_food_lands_inside_the_world() {
        let world = WorldBounds::new(1000.0, 600.0);
        for _ in 0..100 {
            let food = Food::random(world);
            assert!((0.0..1000.0).contains(&food.pos.x));
            assert!((0.0..600.0).contains(&food.pos.y));
        }
    }
}
