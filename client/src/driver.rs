//! Load driver running many simulated players against one server

use crate::input::RandomMover;
use crate::network::{ClientError, GameConnection};
use gridworld_shared::Reply;
use log::{info, warn};
use tokio::net::TcpStream;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Server address, `host:port`
    pub server: String,
    pub players: usize,
    pub moves_per_player: usize,
    /// Fetch the board rendering once every player is done
    pub show: bool,
    /// Base seed; player `n` uses `seed + n`
    pub seed: Option<u64>,
}

/// Totals over every simulated player
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub connected: usize,
    pub refused: usize,
    pub successful_moves: usize,
    pub failed_moves: usize,
    pub board: Option<String>,
}

impl DriverReport {
    pub fn total_moves(&self) -> usize {
        self.successful_moves + self.failed_moves
    }
}

async fn connect_player(
    server: &str,
) -> Result<Option<GameConnection<TcpStream>>, ClientError> {
    let mut connection = GameConnection::connect(server).await?;
    match connection.read_reply().await? {
        Reply::Welcome { player, position } => {
            info!("Connected to server as {} at {}", player, position);
            Ok(Some(connection))
        }
        Reply::ServerFull { player } => {
            warn!("Server is full, {} was refused", player);
            Ok(None)
        }
        other => Err(format!("unexpected greeting: {}", other).into()),
    }
}

async fn play(
    mut connection: GameConnection<TcpStream>,
    mover: RandomMover,
) -> Result<(GameConnection<TcpStream>, usize, usize), ClientError> {
    let (mut succeeded, mut failed) = (0, 0);
    for command in mover {
        if connection.request(command).await?.is_move_success() {
            succeeded += 1;
        } else {
            failed += 1;
        }
    }
    Ok((connection, succeeded, failed))
}

/// Connects every player one after another, then lets them all move at once.
///
/// Connections stay open until every player has finished, so all of them are
/// on the board while the moves run.
pub async fn run(config: &DriverConfig) -> Result<DriverReport, ClientError> {
    let mut report = DriverReport::default();

    let mut connections = Vec::with_capacity(config.players);
    for _ in 0..config.players {
        match connect_player(&config.server).await? {
            Some(connection) => connections.push(connection),
            None => report.refused += 1,
        }
    }
    report.connected = connections.len();

    let tasks: Vec<_> = connections
        .into_iter()
        .enumerate()
        .map(|(index, connection)| {
            let seed = config.seed.map(|seed| seed.wrapping_add(index as u64));
            let mover = RandomMover::new(config.moves_per_player, seed);
            tokio::spawn(play(connection, mover))
        })
        .collect();

    let mut finished = Vec::with_capacity(tasks.len());
    for task in tasks {
        let (connection, succeeded, failed) = task.await??;
        report.successful_moves += succeeded;
        report.failed_moves += failed;
        finished.push(connection);
    }

    if config.show {
        if let Some(connection) = finished.first_mut() {
            report.board = Some(connection.show().await?);
        }
    }

    info!(
        "{} player(s) made {} moves: {} succeeded, {} failed",
        report.connected,
        report.total_moves(),
        report.successful_moves,
        report.failed_moves
    );

    Ok(report)
}
