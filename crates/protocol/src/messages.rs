//! Message schema.
//!
//! Every message is a JSON object with a `type` discriminant. Unknown or
//! malformed inbound messages decode to an error which the gateway drops
//! silently; that permissiveness is part of the contract.

use crate::error::ProtocolError;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// How a connection participates in its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipationMode {
    #[default]
    Playing,
    Spectating,
}

// ── Client → Server ──

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "hello")]
    Hello {
        name: String,
        color: String,
        #[serde(default)]
        avatar: Option<String>,
        #[serde(default, rename = "roomId")]
        room_id: Option<String>,
        #[serde(default)]
        mode: Option<ParticipationMode>,
        #[serde(default, rename = "adminToken")]
        admin_token: Option<String>,
    },
    #[serde(rename = "turn")]
    Turn { dir: i8 },
    #[serde(rename = "boost")]
    Boost { boosting: bool },
    #[serde(rename = "respawn")]
    Respawn,
    #[serde(rename = "admin:startTournament")]
    AdminStartTournament {
        #[serde(rename = "roomIds")]
        room_ids: Vec<String>,
    },
    #[serde(rename = "admin:endRound")]
    AdminEndRound {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(rename = "admin:resetTournament")]
    AdminResetTournament,
    #[serde(rename = "admin:getRoomStatus")]
    AdminGetRoomStatus,
}

/// Decode an inbound text frame, rejecting out-of-range turn directions.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let message: ClientMessage = serde_json::from_str(text)?;
    if let ClientMessage::Turn { dir } = message {
        if !(-1..=1).contains(&dir) {
            return Err(ProtocolError::InvalidTurnDirection(dir));
        }
    }
    Ok(message)
}

// ── Server → Client ──

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "welcome")]
    Welcome {
        #[serde(rename = "selfId", skip_serializing_if = "Option::is_none")]
        self_id: Option<u32>,
        world: WorldView,
    },
    #[serde(rename = "state")]
    State { snapshot: SnapshotView },
    #[serde(rename = "roomStatus")]
    RoomStatus { rooms: Vec<RoomStatusEntry> },
    #[serde(rename = "adminGranted")]
    AdminGranted { message: String },
    #[serde(rename = "adminSuccess")]
    AdminSuccess { message: String },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Encode an outbound message as a JSON text frame.
pub fn encode_server_message(message: &ServerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

/// World dimensions of a room, echoed in `welcome` and in every snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorldView {
    pub width: f32,
    pub height: f32,
}

/// One room's full broadcast state.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotView {
    /// Server tick counter at capture time.
    pub t: u64,
    pub world: WorldView,
    pub players: Vec<PlayerView>,
    pub foods: Vec<Vec2>,
    #[serde(rename = "bonusFood", skip_serializing_if = "Vec::is_empty")]
    pub bonus_food: Vec<BonusFoodView>,
    /// Ids of worms that died this tick.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dead: Vec<u32>,
    #[serde(rename = "tournamentTimer", skip_serializing_if = "Option::is_none")]
    pub tournament_timer: Option<TournamentTimer>,
    #[serde(rename = "tournamentWinner", skip_serializing_if = "Option::is_none")]
    pub tournament_winner: Option<TournamentWinner>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeadView {
    pub pos: Vec2,
    pub angle: f32,
}

/// Per-worm view. Optional fields are omitted at their defaults
/// (boosting = false, thickness = base) to keep snapshots small.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub id: u32,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub head: HeadView,
    pub body: Vec<Vec2>,
    pub score: f32,
    pub alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boosting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BonusFoodView {
    pub pos: Vec2,
    pub kind: String,
    pub value: f32,
}

/// Remaining/total round time in milliseconds.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TournamentTimer {
    pub remaining: i64,
    pub duration: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TournamentWinner {
    pub name: String,
    pub score: f32,
}

/// Lobby directory entry, broadcast to every connection regardless of room.
#[derive(Debug, Clone, Serialize)]
pub struct RoomStatusEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub state: String,
    #[serde(rename = "playerCount")]
    pub player_count: usize,
    #[serde(rename = "spectatorCount")]
    pub spectator_count: usize,
    #[serde(rename = "maxPlayers")]
    pub max_players: usize,
    pub locked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_decodes_with_defaults() {
        let message =
            decode_client_message(r##"{"type":"hello","name":"ada","color":"#ff6b6b"}"##).unwrap();
        match message {
            ClientMessage::Hello {
                name,
                room_id,
                mode,
                admin_token,
                ..
            } => {
                assert_eq!(name, "ada");
                assert!(room_id.is_none());
                assert!(mode.is_none());
                assert!(admin_token.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn admin_messages_use_prefixed_tags() {
        let message = decode_client_message(
            r#"{"type":"admin:startTournament","roomIds":["qualifier-1","qualifier-2"]}"#,
        )
        .unwrap();
        assert!(matches!(
            message,
            ClientMessage::AdminStartTournament { room_ids } if room_ids.len() == 2
        ));
    }

    #[test]
    fn out_of_range_turn_is_rejected() {
        assert!(decode_client_message(r#"{"type":"turn","dir":1}"#).is_ok());
        assert!(matches!(
            decode_client_message(r#"{"type":"turn","dir":3}"#),
            Err(ProtocolError::InvalidTurnDirection(3))
        ));
    }

    #[test]
    fn garbage_is_a_malformed_error() {
        assert!(matches!(
            decode_client_message("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode_client_message(r#"{"type":"warp"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn player_view_omits_default_fields() {
        let view = PlayerView {
            id: 7,
            name: "ada".into(),
            color: "#ff6b6b".into(),
            avatar: None,
            head: HeadView {
                pos: Vec2::new(10.0, 20.0),
                angle: 0.5,
            },
            body: vec![Vec2::ZERO],
            score: 10.0,
            alive: true,
            boosting: None,
            thickness: None,
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("boosting"));
        assert!(!json.contains("thickness"));
        assert!(!json.contains("avatar"));
    }

    #[test]
    fn welcome_omits_self_id_for_spectators() {
        let message = ServerMessage::Welcome {
            self_id: None,
            world: WorldView {
                width: 2500.0,
                height: 1500.0,
            },
        };
        let json = encode_server_message(&message).unwrap();
        assert!(!json.contains("selfId"));
        assert!(json.contains(r#""type":"welcome""#));
    }
}
