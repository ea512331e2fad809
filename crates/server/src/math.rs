//! Toroidal coordinate math.
//!
//! Both world axes wrap, so every distance and position computation in the
//! simulation goes through these helpers. Thresholds are always compared in
//! squared form; nothing here takes a square root.

use glam::Vec2;

/// World dimensions of a room; the wrap modulus for both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Wrap a point into `[0, width) x [0, height)`.
    #[inline]
    pub fn wrap_point(&self, point: Vec2) -> Vec2 {
        Vec2::new(wrap(point.x, self.width), wrap(point.y, self.height))
    }

    /// A uniformly random point inside the world.
    pub fn random_position(&self) -> Vec2 {
        use rand::Rng;
        let mut rng = rand::rng();
        Vec2::new(
            rng.random_range(0.0..self.width),
            rng.random_range(0.0..self.height),
        )
    }
}

/// Map any real `v` into `[0, size)`.
#[inline]
pub fn wrap(v: f32, size: f32) -> f32 {
    let wrapped = v.rem_euclid(size);
    // rem_euclid can return `size` itself when v is a tiny negative value
    if wrapped >= size { wrapped - size } else { wrapped }
}

/// Signed shortest-path delta equivalent to `d` on a cyclic domain of
/// length `size`; the result lies in `(-size/2, size/2]`.
#[inline]
pub fn wrap_delta(d: f32, size: f32) -> f32 {
    let half = size / 2.0;
    let mut delta = d.rem_euclid(size);
    if delta > half {
        delta -= size;
    }
    delta
}

/// Squared Euclidean distance with per-axis wrap. The single source of truth
/// for all proximity tests (collision, food pickup).
#[inline]
pub fn distance_squared(a: Vec2, b: Vec2, world: WorldBounds) -> f32 {
    let dx = wrap_delta(a.x - b.x, world.width);
    let dy = wrap_delta(a.y - b.y, world.height);
    dx * dx + dy * dy
}
