//! Random movement input for simulated players

use gridworld_shared::{Command, Direction};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Produces a fixed number of random `MOVE` commands
pub struct RandomMover {
    rng: StdRng,
    remaining: usize,
}

impl RandomMover {
    pub fn new(moves: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            remaining: moves,
        }
    }
}

impl Iterator for RandomMover {
    type Item = Command;

    fn next(&mut self) -> Option<Command> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Direction::ALL.choose(&mut self.rng).copied().map(Command::Move)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RandomMover {}
