//! Error types for board operations

use gridworld_shared::{PlayerId, Position};
use thiserror::Error;

/// Failures of a single board operation.
///
/// None of these are fatal: the connection handler turns each one into a
/// reply line and keeps serving the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("board is full ({capacity} cells taken)")]
    CapacityExceeded { capacity: usize },
    #[error("destination {to} is occupied")]
    MoveRejected { from: Position, to: Position },
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("displacement chain exceeded {limit} players")]
    CascadeLimitExceeded { limit: usize },
    #[error("cell {0} is already occupied")]
    CellOccupied(Position),
    #[error("player {0} has already joined")]
    AlreadyJoined(PlayerId),
}

/// Disagreement between the board and the position table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("player {player} is recorded at {position}, outside a board of side {side}")]
    OutOfRange {
        player: PlayerId,
        position: Position,
        side: usize,
    },
    #[error("player {player} is recorded at {position} but the cell does not hold it")]
    CellMismatch { player: PlayerId, position: Position },
    #[error("{cells} occupied cells for {players} registered players")]
    CountMismatch { cells: usize, players: usize },
}
