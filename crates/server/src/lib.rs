//! Worm arena game server library.

pub mod config;
pub mod entity;
pub mod math;
pub mod room;
pub mod server;
pub mod spatial;

// Re-export commonly used types
pub use config::Config;
pub use room::{Room, RoomManager, RoomPhase, RoomState};
