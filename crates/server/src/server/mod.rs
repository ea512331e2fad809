//! WebSocket gateway.

use crate::config::Config;
use crate::room::RoomManager;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info};

pub mod session;

pub use session::{ConnectionRegistry, Session};

/// Run the game server: start every room loop and accept connections until
/// the listener fails.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on ws://{}", addr);

    let registry = Arc::new(ConnectionRegistry::new());
    let manager = Arc::new(RoomManager::new(config, Arc::clone(&registry))?);
    manager.start();

    loop {
        let (stream, addr) = listener.accept().await?;
        let manager = Arc::clone(&manager);
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(error) = handle_connection(stream, addr, manager, registry).await {
                error!("Connection error from {}: {}", addr, error);
            }
        });
    }
}

/// Handle a single WebSocket connection: inbound frames feed the session,
/// outbound frames arrive on the session's channel from the room loops.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    manager: Arc<RoomManager>,
    registry: Arc<ConnectionRegistry>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New connection from {}", addr);

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let mut session = Session::new(manager, registry, tx);

    loop {
        tokio::select! {
            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        session.handle_text(text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        debug!("WebSocket error from {}: {}", addr, error);
                        break;
                    }
                    None => break,
                }
            }
            outbound = rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if write.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    session.disconnect().await;
    Ok(())
}
