//! Server network layer accepting TCP connections and coordinating handlers

use crate::config::ServerConfig;
use crate::connection::{handle_connection, ConnectionContext};
use crate::dump::spawn_state_dumper;
use crate::spatial::SpatialState;
use gridworld_shared::PlayerId;
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PlayerJoined { player: PlayerId },
    PlayerLeft { player: PlayerId },
    Shutdown,
}

/// Stops a running [`Server`] from outside its loop
#[derive(Clone)]
pub struct ShutdownHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if let Err(e) = self.server_tx.send(ServerMessage::Shutdown) {
            error!("Failed to send shutdown message: {}", e);
        }
    }
}

/// Main server accepting players onto the shared board
pub struct Server {
    listener: TcpListener,
    state: Arc<SpatialState>,
    config: ServerConfig,

    // Communication channel from connection tasks
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig, state: Arc<SpatialState>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_address).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "Running Game Server: Host = {} Port = {}",
            local_addr.ip(),
            local_addr.port()
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            state,
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns the task serving one accepted connection
    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let player = PlayerId::from_addr(addr);
        let context = ConnectionContext {
            state: Arc::clone(&self.state),
            server_tx: self.server_tx.clone(),
            exit_on_show: self.config.exit_on_show,
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, player.clone(), context).await {
                error!("Connection with {} failed: {}", player, e);
            }
        });
    }

    /// Accepts players until shut down
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let dumper = self
            .config
            .dump
            .clone()
            .map(|dump| spawn_state_dumper(Arc::clone(&self.state), dump));

        info!("Waiting for new players ...");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PlayerJoined { player }) => {
                            debug!("{} joined, {} player(s) on the board", player, self.state.player_count());
                        },
                        Some(ServerMessage::PlayerLeft { player }) => {
                            debug!("{} left, {} player(s) on the board", player, self.state.player_count());
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },
            }
        }

        if let Some(dumper) = dumper {
            dumper.abort();
        }

        Ok(())
    }
}
