//! Uniform segment grid.
//!
//! Buckets worm body segments by toroidally-wrapped cell coordinate and
//! answers 3x3-neighborhood queries with both axes wrapped modulo the grid
//! dimensions, which gives wrap-correct adjacency without per-pair wrap math.
//! The grid is rebuilt each tick; rebuild cost is linear in segment count.

use crate::math::WorldBounds;
use glam::Vec2;

/// Grid cell size in world units.
pub const GRID_CELL_SIZE: f32 = 100.0;

/// A body segment bucketed in the grid.
#[derive(Debug, Clone, Copy)]
pub struct SegmentRef {
    /// Owning worm id.
    pub owner: u32,
    /// Index into the owner's body (0 = neck).
    pub index: usize,
    pub pos: Vec2,
}

#[derive(Debug)]
pub struct SegmentGrid {
    cols: i64,
    rows: i64,
    buckets: Vec<Vec<SegmentRef>>,
}

impl SegmentGrid {
    /// Create an empty grid covering `world`. Worlds always span at least one
    /// cell per axis.
    pub fn new(world: WorldBounds) -> Self {
        let cols = ((world.width / GRID_CELL_SIZE).ceil() as i64).max(1);
        let rows = ((world.height / GRID_CELL_SIZE).ceil() as i64).max(1);
        Self {
            cols,
            rows,
            buckets: vec![Vec::new(); (cols * rows) as usize],
        }
    }

    /// Bucket index for a point. `rem_euclid` keeps the modulo bias correct
    /// for coordinates that are negative or beyond the grid bounds.
    #[inline]
    fn bucket_index(&self, point: Vec2) -> usize {
        let col = ((point.x / GRID_CELL_SIZE).floor() as i64).rem_euclid(self.cols);
        let row = ((point.y / GRID_CELL_SIZE).floor() as i64).rem_euclid(self.rows);
        (row * self.cols + col) as usize
    }

    /// Insert a body segment.
    pub fn insert(&mut self, pos: Vec2, owner: u32, index: usize) {
        let bucket = self.bucket_index(pos);
        self.buckets[bucket].push(SegmentRef { owner, index, pos });
    }

    /// All segments in the 3x3 block of cells centered on `point`'s cell,
    /// with each axis index wrapped. An empty result is a valid answer.
    pub fn query_nearby(&self, point: Vec2) -> impl Iterator<Item = &SegmentRef> {
        let col = ((point.x / GRID_CELL_SIZE).floor() as i64).rem_euclid(self.cols);
        let row = ((point.y / GRID_CELL_SIZE).floor() as i64).rem_euclid(self.rows);
        let (cols, rows) = (self.cols, self.rows);
        (-1..=1).flat_map(move |dy| {
            (-1..=1).flat_map(move |dx| {
                let c = (col + dx).rem_euclid(cols);
                let r = (row + dy).rem_euclid(rows);
                self.buckets[(r * cols + c) as usize].iter()
            })
        })
    }
}
