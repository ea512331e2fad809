//! Spatial indexing utilities.
//!
//! Uniform grid over body segments, rebuilt from scratch every tick.

mod grid;

pub use grid::{SegmentGrid, SegmentRef, GRID_CELL_SIZE};
