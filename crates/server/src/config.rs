//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub game: GameConfig,
    /// Fixed room topology. The defaults reproduce the five-room layout the
    /// clients expect; overriding them in config.toml changes the lobby.
    #[serde(default = "default_rooms")]
    pub rooms: Vec<RoomConfig>,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("config.toml");
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No config.toml found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }

    pub fn room(&self, id: &str) -> Option<&RoomConfig> {
        self.rooms.iter().find(|room| room.id == id)
    }

    /// The room unrecognized or missing `roomId`s fall back to.
    pub fn default_room(&self) -> &RoomConfig {
        self.rooms
            .iter()
            .find(|room| room.category == RoomCategory::Casual)
            .unwrap_or(&self.rooms[0])
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            game: GameConfig::default(),
            rooms: default_rooms(),
        }
    }
}

/// Server networking and general settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Simulation tick interval in milliseconds (30 Hz).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Minimum milliseconds between snapshot broadcasts per room.
    #[serde(default = "default_broadcast_interval")]
    pub broadcast_interval_ms: u64,
    /// Milliseconds between room directory broadcasts.
    #[serde(default = "default_room_status_interval")]
    pub room_status_interval_ms: u64,
    /// Shared secret for admin commands (empty = admin disabled).
    #[serde(default)]
    pub admin_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            tick_interval_ms: default_tick_interval(),
            broadcast_interval_ms: default_broadcast_interval(),
            room_status_interval_ms: default_room_status_interval(),
            admin_token: String::new(),
        }
    }
}

fn default_port() -> u16 {
    8443
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_tick_interval() -> u64 {
    33
}
fn default_broadcast_interval() -> u64 {
    66
}
fn default_room_status_interval() -> u64 {
    2000
}

/// Tournament round timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GameConfig {
    /// Round length in seconds for tournament rooms.
    #[serde(default = "default_round_duration")]
    pub round_duration_secs: u64,
    /// Countdown before a started round goes active, in seconds.
    #[serde(default = "default_countdown")]
    pub countdown_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: default_round_duration(),
            countdown_secs: default_countdown(),
        }
    }
}

fn default_round_duration() -> u64 {
    180
}
fn default_countdown() -> u64 {
    5
}

/// Room lifecycle category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomCategory {
    Tournament,
    Casual,
}

impl RoomCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomCategory::Tournament => "tournament",
            RoomCategory::Casual => "casual",
        }
    }
}

/// A single room's static configuration. Immutable after startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomConfig {
    pub id: String,
    pub name: String,
    pub world_width: f32,
    pub world_height: f32,
    pub max_players: usize,
    pub category: RoomCategory,
    /// Locked rooms reject joins (they fall back to the casual room).
    #[serde(default)]
    pub locked: bool,
    /// Plain food population target; bonus food is maintained at 20% of this.
    #[serde(default = "default_food_count")]
    pub food_count: usize,
}

fn default_food_count() -> usize {
    250
}

fn default_rooms() -> Vec<RoomConfig> {
    let qualifier = |index: usize| RoomConfig {
        id: format!("qualifier-{index}"),
        name: format!("Qualifier {index}"),
        world_width: 2000.0,
        world_height: 1200.0,
        max_players: 20,
        category: RoomCategory::Tournament,
        locked: false,
        food_count: 250,
    };
    vec![
        qualifier(1),
        qualifier(2),
        qualifier(3),
        RoomConfig {
            id: "finals".to_string(),
            name: "Finals".to_string(),
            world_width: 1000.0,
            world_height: 600.0,
            max_players: 12,
            category: RoomCategory::Tournament,
            locked: true,
            food_count: 120,
        },
        RoomConfig {
            id: "casual".to_string(),
            name: "Casual".to_string(),
            world_width: 2500.0,
            world_height: 1500.0,
            max_players: 30,
            category: RoomCategory::Casual,
            locked: false,
            food_count: 350,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_topology_matches_fixed_layout() {
        let config = Config::default();
        assert_eq!(config.rooms.len(), 5);

        let qualifiers: Vec<_> = config
            .rooms
            .iter()
            .filter(|room| room.id.starts_with("qualifier-"))
            .collect();
        assert_eq!(qualifiers.len(), 3);
        for room in qualifiers {
            assert_eq!((room.world_width, room.world_height), (2000.0, 1200.0));
            assert_eq!(room.max_players, 20);
            assert_eq!(room.category, RoomCategory::Tournament);
        }

        let finals = config.room("finals").unwrap();
        assert_eq!((finals.world_width, finals.world_height), (1000.0, 600.0));
        assert_eq!(finals.max_players, 12);
        assert!(finals.locked);

        let casual = config.room("casual").unwrap();
        assert_eq!((casual.world_width, casual.world_height), (2500.0, 1500.0));
        assert_eq!(casual.max_players, 30);
        assert_eq!(casual.category, RoomCategory::Casual);
    }

    #[test]
    fn default_room_is_the_casual_room() {
        let config = Config::default();
        assert_eq!(config.default_room().id, "casual");
    }
}
