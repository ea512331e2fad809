//! Shared protocol crate for the worm arena server.
//!
//! This crate contains:
//! - The tagged-union message schema (client and server sides)
//! - Snapshot view types sent inside `state` messages
//! - JSON encode/decode helpers

mod error;
pub mod messages;

pub use error::ProtocolError;
pub use messages::{
    decode_client_message, encode_server_message, BonusFoodView, ClientMessage, HeadView,
    ParticipationMode, PlayerView, RoomStatusEntry, ServerMessage, SnapshotView, TournamentTimer,
    TournamentWinner, WorldView,
};
