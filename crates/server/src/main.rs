//! Worm arena game server.

use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod entity;
mod math;
mod room;
mod server;
mod spatial;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Worm Arena Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::Config::load()?;
    info!("Loaded configuration");
    info!("  Port: {}", config.server.port);
    info!("  Rooms: {}", config.rooms.len());
    for room in &config.rooms {
        info!(
            "    {} ({}x{}, {} players, {:?})",
            room.id, room.world_width, room.world_height, room.max_players, room.category
        );
    }

    // Start the game server
    server::run(config).await?;

    Ok(())
}
