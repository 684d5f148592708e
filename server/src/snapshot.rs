//! Point-in-time copy of the board and the position table

use crate::board::CellState;
use crate::error::ConsistencyError;
use gridworld_shared::{PlayerId, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Board and position table copied under one lock acquisition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub side: usize,
    pub cells: Vec<CellState>,
    pub positions: BTreeMap<PlayerId, Position>,
}

impl Snapshot {
    pub fn cell(&self, position: Position) -> &CellState {
        &self.cells[position.y * self.side + position.x]
    }

    pub fn position_of(&self, player: &PlayerId) -> Option<Position> {
        self.positions.get(player).copied()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_free()).count()
    }

    /// Checks that every table entry points at a cell holding that player and
    /// that no cell is occupied without a table entry.
    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        for (player, &position) in &self.positions {
            if !position.in_bounds(self.side) {
                return Err(ConsistencyError::OutOfRange {
                    player: player.clone(),
                    position,
                    side: self.side,
                });
            }
            if self.cell(position).occupant() != Some(player) {
                return Err(ConsistencyError::CellMismatch {
                    player: player.clone(),
                    position,
                });
            }
        }

        // Entries map to distinct cells, so equal counts rule out strays
        let cells = self.occupied_count();
        if cells != self.positions.len() {
            return Err(ConsistencyError::CountMismatch {
                cells,
                players: self.positions.len(),
            });
        }

        Ok(())
    }
}

/// Text grid with one row per `y`: `0` marks a free cell, `X` an occupied one.
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.side) {
            for cell in row {
                f.write_str(if cell.is_free() { "0 " } else { "X " })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
