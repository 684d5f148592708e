//! Cell occupancy for the toroidal board
//!
//! The board itself is not synchronized. Every mutation happens while the
//! owning [`SpatialState`](crate::spatial::SpatialState) holds its board-wide
//! lock, together with the matching position table update.

use gridworld_shared::{PlayerId, Position};
use serde::{Deserialize, Serialize};

/// State of a single cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    Free,
    Occupied(PlayerId),
}

impl CellState {
    pub fn is_free(&self) -> bool {
        matches!(self, CellState::Free)
    }

    pub fn occupant(&self) -> Option<&PlayerId> {
        match self {
            CellState::Free => None,
            CellState::Occupied(player) => Some(player),
        }
    }
}

/// Fixed `side × side` grid stored row-major
#[derive(Debug, Clone)]
pub struct Board {
    side: usize,
    cells: Vec<CellState>,
}

impl Board {
    /// Creates a board with every cell free.
    pub fn new(side: usize) -> Self {
        let side = side.max(1);
        Self {
            side,
            cells: vec![CellState::Free; side * side],
        }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    /// Number of cells, i.e. the most players the board can hold.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    fn index(&self, position: Position) -> usize {
        debug_assert!(position.in_bounds(self.side), "{position} off the board");
        position.y * self.side + position.x
    }

    pub fn cell_state(&self, position: Position) -> &CellState {
        &self.cells[self.index(position)]
    }

    pub fn set_free(&mut self, position: Position) {
        let index = self.index(position);
        self.cells[index] = CellState::Free;
    }

    pub fn set_occupied(&mut self, position: Position, player: PlayerId) {
        let index = self.index(position);
        self.cells[index] = CellState::Occupied(player);
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_free()).count()
    }

    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }
}
