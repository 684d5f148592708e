use gridworld_shared::{PlayerId, Position};
use std::collections::HashMap;

/// Current cell of every joined player.
///
/// Only ever changed next to the matching [`Board`](crate::board::Board)
/// update so the two stay inverse of each other.
#[derive(Debug, Clone, Default)]
pub struct PositionTable {
    positions: HashMap<PlayerId, Position>,
}

impl PositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, player: &PlayerId) -> Option<Position> {
        self.positions.get(player).copied()
    }

    pub fn set(&mut self, player: PlayerId, position: Position) {
        self.positions.insert(player, position);
    }

    pub fn remove(&mut self, player: &PlayerId) -> Option<Position> {
        self.positions.remove(player)
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.positions.contains_key(player)
    }

    pub(crate) fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &Position)> {
        self.positions.iter()
    }
}
