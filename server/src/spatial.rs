//! Authoritative board state shared by every connection
//!
//! [`SpatialState`] owns the [`Board`] and the [`PositionTable`] and keeps
//! them consistent with each other. Both live inside a single `World` behind
//! one board-wide mutex:
//! - `join`, `place`, `move_player`, `leave` and `snapshot` each take the lock
//!   exactly once and hold it for the whole operation, cascade included
//! - the lock is never held across an `.await`; callers do their network I/O
//!   before or after the call
//! - operations are therefore linearizable in lock acquisition order
//!
//! ## Collisions
//!
//! A move into an occupied cell is resolved by the configured
//! [`CollisionPolicy`]. Under `Cascade` the occupant is pushed to a random
//! neighbouring cell first, which may push another occupant, and so on. The
//! displacement chain is planned without touching the board and only applied
//! once it ends on a free cell, so a failed move never leaves partial changes.

use crate::board::{Board, CellState};
use crate::config::GridConfig;
use crate::error::GridError;
use crate::position_table::PositionTable;
use crate::snapshot::Snapshot;
use gridworld_shared::{Direction, PlayerId, Position};
use log::debug;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Resolution of a move into an occupied cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CollisionPolicy {
    /// The move fails and nobody moves
    Reject,
    /// The occupant is displaced to a neighbouring cell first
    Cascade,
}

/// Offsets tried when pushing an occupant out of the way
const PERTURBATIONS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Result of a successful move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Cell the mover stands on afterwards
    pub position: Position,
    /// Players pushed along the way, with their new cells, nearest first
    pub displaced: Vec<(PlayerId, Position)>,
}

/// One link of a displacement chain
#[derive(Debug)]
struct Step {
    player: PlayerId,
    from: Position,
    to: Position,
}

/// Everything guarded by the board-wide lock
struct World {
    board: Board,
    positions: PositionTable,
    occupied: usize,
    rng: StdRng,
}

impl World {
    fn occupy(&mut self, player: &PlayerId, position: Position) -> Position {
        self.board.set_occupied(position, player.clone());
        self.positions.set(player.clone(), position);
        self.occupied += 1;
        self.debug_check_counts();
        position
    }

    fn debug_check_counts(&self) {
        debug_assert_eq!(self.positions.len(), self.occupied);
        debug_assert_eq!(self.board.occupied_count(), self.occupied);
    }

    fn join(&mut self, player: &PlayerId) -> Result<Position, GridError> {
        if let Some(position) = self.positions.get(player) {
            return Ok(position);
        }

        let capacity = self.board.capacity();
        if self.occupied >= capacity {
            return Err(GridError::CapacityExceeded { capacity });
        }

        // Rejection sampling; a free cell exists since occupied < capacity
        let side = self.board.side();
        let position = loop {
            let candidate = Position::new(self.rng.gen_range(0..side), self.rng.gen_range(0..side));
            if self.board.cell_state(candidate).is_free() {
                break candidate;
            }
        };

        Ok(self.occupy(player, position))
    }

    fn place(&mut self, player: &PlayerId, position: Position) -> Result<Position, GridError> {
        if self.positions.contains(player) {
            return Err(GridError::AlreadyJoined(player.clone()));
        }

        let position = Position::wrapped(position.x as i64, position.y as i64, self.board.side());
        if !self.board.cell_state(position).is_free() {
            return Err(GridError::CellOccupied(position));
        }

        Ok(self.occupy(player, position))
    }

    fn leave(&mut self, player: &PlayerId) -> Option<Position> {
        let position = self.positions.remove(player)?;
        self.board.set_free(position);
        self.occupied -= 1;
        self.debug_check_counts();
        Some(position)
    }

    fn move_player(
        &mut self,
        player: &PlayerId,
        dx: i32,
        dy: i32,
        policy: CollisionPolicy,
        cascade_limit: usize,
    ) -> Result<MoveOutcome, GridError> {
        let origin = self
            .positions
            .get(player)
            .ok_or_else(|| GridError::UnknownPlayer(player.clone()))?;
        let destination = origin.offset(dx.signum(), dy.signum(), self.board.side());

        if destination == origin {
            return Ok(MoveOutcome {
                position: origin,
                displaced: Vec::new(),
            });
        }

        let chain = self.plan_chain(player, origin, destination, policy, cascade_limit)?;
        self.apply_chain(&chain);

        Ok(MoveOutcome {
            position: destination,
            displaced: chain[1..]
                .iter()
                .map(|step| (step.player.clone(), step.to))
                .collect(),
        })
    }

    /// Builds the displacement chain for a move without touching the board.
    ///
    /// The chain starts with the mover and ends with a step onto a free cell.
    /// Cells held by chain members are never picked as a target, so the chain
    /// cannot loop back on itself.
    fn plan_chain(
        &mut self,
        player: &PlayerId,
        origin: Position,
        destination: Position,
        policy: CollisionPolicy,
        cascade_limit: usize,
    ) -> Result<Vec<Step>, GridError> {
        let rejected = GridError::MoveRejected {
            from: origin,
            to: destination,
        };
        let mut chain = vec![Step {
            player: player.clone(),
            from: origin,
            to: destination,
        }];

        loop {
            let target = chain[chain.len() - 1].to;
            let occupant = match self.board.cell_state(target) {
                CellState::Free => return Ok(chain),
                CellState::Occupied(occupant) => occupant.clone(),
            };

            if policy == CollisionPolicy::Reject {
                return Err(rejected);
            }
            if chain.len() > cascade_limit {
                return Err(GridError::CascadeLimitExceeded {
                    limit: cascade_limit,
                });
            }

            let next = self.pick_displacement(target, &chain).ok_or(rejected.clone())?;
            chain.push(Step {
                player: occupant,
                from: target,
                to: next,
            });
        }
    }

    /// Picks a random neighbour of `cell` that no chain member stands on.
    fn pick_displacement(&mut self, cell: Position, chain: &[Step]) -> Option<Position> {
        let side = self.board.side();
        let candidates: Vec<Position> = PERTURBATIONS
            .iter()
            .map(|&(cx, cy)| cell.offset(cx, cy, side))
            .filter(|candidate| *candidate != cell && chain.iter().all(|step| step.from != *candidate))
            .collect();

        candidates.choose(&mut self.rng).copied()
    }

    /// Applies a planned chain from its free end back to the mover.
    fn apply_chain(&mut self, chain: &[Step]) {
        for step in chain.iter().rev() {
            self.board.set_occupied(step.to, step.player.clone());
            self.positions.set(step.player.clone(), step.to);
            self.board.set_free(step.from);
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            side: self.board.side(),
            cells: self.board.cells().to_vec(),
            positions: self
                .positions
                .iter()
                .map(|(player, position)| (player.clone(), *position))
                .collect(),
        }
    }
}

/// Board-wide state manager shared by all connection handlers
pub struct SpatialState {
    world: Mutex<World>,
    side: usize,
    capacity: usize,
    policy: CollisionPolicy,
    cascade_limit: usize,
}

impl SpatialState {
    pub fn new(config: GridConfig) -> Self {
        let board = Board::new(config.side);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            side: board.side(),
            capacity: board.capacity(),
            world: Mutex::new(World {
                board,
                positions: PositionTable::new(),
                occupied: 0,
                rng,
            }),
            policy: config.policy,
            cascade_limit: config.cascade_limit,
        }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    pub fn player_count(&self) -> usize {
        self.world.lock().occupied
    }

    /// Puts a player on a random free cell.
    ///
    /// Joining twice is a no-op that returns the current cell.
    pub fn join(&self, player: &PlayerId) -> Result<Position, GridError> {
        self.world.lock().join(player)
    }

    /// Puts a player on a specific cell.
    pub fn place(&self, player: &PlayerId, position: Position) -> Result<Position, GridError> {
        self.world.lock().place(player, position)
    }

    /// Moves a player one step, wrapping around the board edges.
    ///
    /// Displacements are reduced to their sign, so each axis moves at most one
    /// cell. On error nothing on the board has changed.
    pub fn move_player(&self, player: &PlayerId, dx: i32, dy: i32) -> Result<MoveOutcome, GridError> {
        let outcome =
            self.world
                .lock()
                .move_player(player, dx, dy, self.policy, self.cascade_limit)?;

        if !outcome.displaced.is_empty() {
            debug!(
                "{} moved to {} displacing {} player(s)",
                player,
                outcome.position,
                outcome.displaced.len()
            );
        }
        Ok(outcome)
    }

    pub fn move_in(&self, player: &PlayerId, direction: Direction) -> Result<MoveOutcome, GridError> {
        let (dx, dy) = direction.delta();
        self.move_player(player, dx, dy)
    }

    pub fn current_position(&self, player: &PlayerId) -> Option<Position> {
        self.world.lock().positions.get(player)
    }

    /// Removes a player and frees its cell.
    pub fn leave(&self, player: &PlayerId) -> Option<Position> {
        self.world.lock().leave(player)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.world.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsistencyError;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn state(side: usize, policy: CollisionPolicy, seed: u64) -> SpatialState {
        SpatialState::new(GridConfig::with_side(side).policy(policy).seed(seed))
    }

    fn id(n: usize) -> PlayerId {
        PlayerId::new(format!("10.0.0.1/{}", 5000 + n))
    }

    fn is_neighbour(a: Position, b: Position, side: usize) -> bool {
        PERTURBATIONS
            .iter()
            .any(|&(dx, dy)| a.offset(dx, dy, side) == b)
    }

    fn assert_consistent(state: &SpatialState) {
        let result: Result<(), ConsistencyError> = state.snapshot().check_consistency();
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_join_places_player() {
        let state = state(5, CollisionPolicy::Cascade, 1);
        let player = id(0);

        let position = state.join(&player).unwrap();
        assert!(position.in_bounds(5));
        assert_eq!(state.current_position(&player), Some(position));
        assert_eq!(state.player_count(), 1);
        assert_consistent(&state);
    }

    #[test]
    fn test_join_twice_is_noop() {
        let state = state(5, CollisionPolicy::Cascade, 2);
        let player = id(0);

        let first = state.join(&player).unwrap();
        let second = state.join(&player).unwrap();
        assert_eq!(first, second);
        assert_eq!(state.player_count(), 1);
    }

    #[test]
    fn test_capacity_exceeded_on_last_join() {
        let side = 3;
        let state = state(side, CollisionPolicy::Cascade, 3);
        let mut cells = HashSet::new();

        for n in 0..side * side {
            let position = state.join(&id(n)).unwrap();
            assert!(cells.insert(position), "{position} handed out twice");
        }

        assert_eq!(
            state.join(&id(side * side)),
            Err(GridError::CapacityExceeded { capacity: 9 })
        );
        assert_eq!(state.player_count(), 9);
        assert_consistent(&state);
    }

    #[test]
    fn test_leave_reclaims_capacity() {
        let state = state(1, CollisionPolicy::Cascade, 4);
        let (a, b) = (id(0), id(1));

        assert_eq!(state.join(&a), Ok(Position::new(0, 0)));
        assert!(state.join(&b).is_err());

        assert_eq!(state.leave(&a), Some(Position::new(0, 0)));
        assert_eq!(state.leave(&a), None);
        assert_eq!(state.current_position(&a), None);
        assert_eq!(state.join(&b), Ok(Position::new(0, 0)));
        assert_consistent(&state);
    }

    #[test]
    fn test_place_errors() {
        let state = state(4, CollisionPolicy::Cascade, 5);
        let (a, b) = (id(0), id(1));

        assert_eq!(state.place(&a, Position::new(5, 6)), Ok(Position::new(1, 2)));
        assert_eq!(
            state.place(&a, Position::new(0, 0)),
            Err(GridError::AlreadyJoined(a.clone()))
        );
        assert_eq!(
            state.place(&b, Position::new(1, 2)),
            Err(GridError::CellOccupied(Position::new(1, 2)))
        );
    }

    #[test]
    fn test_null_move_changes_nothing() {
        let state = state(4, CollisionPolicy::Cascade, 6);
        let player = id(0);
        state.place(&player, Position::new(2, 3)).unwrap();
        state.place(&id(1), Position::new(3, 3)).unwrap();
        let before = state.snapshot();

        let outcome = state.move_player(&player, 0, 0).unwrap();
        assert_eq!(outcome.position, Position::new(2, 3));
        assert!(outcome.displaced.is_empty());
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_move_wraps_around_corner() {
        let side = 6;
        let state = state(side, CollisionPolicy::Reject, 7);
        let player = id(0);
        state.place(&player, Position::new(side - 1, side - 1)).unwrap();

        let outcome = state.move_player(&player, 1, 1).unwrap();
        assert_eq!(outcome.position, Position::new(0, 0));
        assert_eq!(state.current_position(&player), Some(Position::new(0, 0)));
        assert!(state.snapshot().cell(Position::new(side - 1, side - 1)).is_free());
        assert_consistent(&state);
    }

    #[test]
    fn test_move_in_direction() {
        let state = state(5, CollisionPolicy::Reject, 8);
        let player = id(0);
        state.place(&player, Position::new(2, 2)).unwrap();

        let expected = [
            (Direction::Up, Position::new(2, 3)),
            (Direction::UpRight, Position::new(3, 4)),
            (Direction::Right, Position::new(4, 4)),
            (Direction::DownRight, Position::new(0, 3)),
            (Direction::Down, Position::new(0, 2)),
            (Direction::DownLeft, Position::new(4, 1)),
            (Direction::Left, Position::new(3, 1)),
            (Direction::UpLeft, Position::new(2, 2)),
        ];
        for (direction, position) in expected {
            assert_eq!(state.move_in(&player, direction).unwrap().position, position);
        }
    }

    #[test]
    fn test_unknown_player_cannot_move() {
        let state = state(3, CollisionPolicy::Cascade, 9);
        let ghost = id(42);
        assert_eq!(
            state.move_player(&ghost, 1, 0),
            Err(GridError::UnknownPlayer(ghost))
        );
        assert_eq!(state.player_count(), 0);
    }

    #[test]
    fn test_reject_policy_blocks_occupied_destination() {
        let state = state(4, CollisionPolicy::Reject, 10);
        let (mover, blocker) = (id(0), id(1));
        state.place(&mover, Position::new(0, 0)).unwrap();
        state.place(&blocker, Position::new(1, 0)).unwrap();
        let before = state.snapshot();

        assert_eq!(
            state.move_in(&mover, Direction::Right),
            Err(GridError::MoveRejected {
                from: Position::new(0, 0),
                to: Position::new(1, 0),
            })
        );
        assert_eq!(state.current_position(&mover), Some(Position::new(0, 0)));
        assert_eq!(state.current_position(&blocker), Some(Position::new(1, 0)));
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_cascade_policy_displaces_occupant() {
        for seed in 0..32 {
            let side = 5;
            let state = state(side, CollisionPolicy::Cascade, seed);
            let (mover, blocker) = (id(0), id(1));
            state.place(&mover, Position::new(0, 0)).unwrap();
            state.place(&blocker, Position::new(1, 0)).unwrap();

            let outcome = state.move_in(&mover, Direction::Right).unwrap();
            assert_eq!(outcome.position, Position::new(1, 0));
            assert_eq!(state.current_position(&mover), Some(Position::new(1, 0)));

            let pushed = state.current_position(&blocker).unwrap();
            assert_ne!(pushed, Position::new(0, 0));
            assert_ne!(pushed, Position::new(1, 0));
            assert!(is_neighbour(Position::new(1, 0), pushed, side));
            assert_eq!(outcome.displaced, vec![(blocker.clone(), pushed)]);

            assert!(state.snapshot().cell(Position::new(0, 0)).is_free());
            assert_consistent(&state);
        }
    }

    #[test]
    fn test_cascade_on_two_by_two_board() {
        for seed in 0..16 {
            let state = state(2, CollisionPolicy::Cascade, seed);
            let (mover, blocker) = (id(0), id(1));
            state.place(&mover, Position::new(0, 0)).unwrap();
            state.place(&blocker, Position::new(1, 0)).unwrap();

            state.move_in(&mover, Direction::Right).unwrap();
            let pushed = state.current_position(&blocker).unwrap();
            assert!(pushed == Position::new(0, 1) || pushed == Position::new(1, 1));
            assert_consistent(&state);
        }
    }

    #[test]
    fn test_cascade_limit_zero_fails_cleanly() {
        let state = SpatialState::new(
            GridConfig::with_side(4)
                .policy(CollisionPolicy::Cascade)
                .cascade_limit(0)
                .seed(11),
        );
        let (mover, blocker) = (id(0), id(1));
        state.place(&mover, Position::new(0, 0)).unwrap();
        state.place(&blocker, Position::new(1, 0)).unwrap();
        let before = state.snapshot();

        assert_eq!(
            state.move_in(&mover, Direction::Right),
            Err(GridError::CascadeLimitExceeded { limit: 0 })
        );
        assert_eq!(state.snapshot(), before);
    }

    /// Fills every cell of the board except `holes`, row by row.
    fn crowd(state: &SpatialState, holes: &[Position]) {
        let side = state.side();
        let mut n = 0;
        for y in 0..side {
            for x in 0..side {
                let cell = Position::new(x, y);
                if !holes.contains(&cell) {
                    state.place(&id(n), cell).unwrap();
                    n += 1;
                }
            }
        }
    }

    #[test]
    fn test_cascade_chain_pushes_each_player_to_a_neighbour() {
        // 4x4 board with one hole at (3, 3). The first occupant pushed out of
        // (1, 0) has no free neighbour, so every success displaces two or more.
        let side = 4;
        let hole = Position::new(3, 3);
        let mut chains = 0;

        for seed in 0..64 {
            let state = SpatialState::new(
                GridConfig::with_side(side)
                    .policy(CollisionPolicy::Cascade)
                    .cascade_limit(side * side)
                    .seed(seed),
            );
            crowd(&state, &[hole]);
            let mover = id(0);
            let before = state.snapshot();
            assert_eq!(before.position_of(&mover), Some(Position::new(0, 0)));

            let outcome = match state.move_in(&mover, Direction::Right) {
                Ok(outcome) => outcome,
                Err(GridError::MoveRejected { .. }) => {
                    assert_eq!(state.snapshot(), before);
                    continue;
                }
                Err(other) => panic!("unexpected error {other}"),
            };
            assert_eq!(outcome.position, Position::new(1, 0));
            assert!(outcome.displaced.len() >= 2);

            // Each displaced player left the cell the previous one moved into
            let mut visited = vec![Position::new(0, 0)];
            let mut pushed_from = Position::new(1, 0);
            for (player, to) in &outcome.displaced {
                assert_eq!(before.position_of(player), Some(pushed_from));
                assert!(is_neighbour(pushed_from, *to, side));
                visited.push(pushed_from);
                assert!(!visited.contains(to), "{player} pushed back onto {to}");
                assert_eq!(state.current_position(player), Some(*to));
                pushed_from = *to;
            }
            assert_eq!(pushed_from, hole);

            for (player, position) in &before.positions {
                let moved = *player == mover || outcome.displaced.iter().any(|(p, _)| p == player);
                if !moved {
                    assert_eq!(state.current_position(player), Some(*position));
                }
            }
            assert!(state.snapshot().cell(Position::new(0, 0)).is_free());
            assert_consistent(&state);
            chains += 1;
        }

        assert!(chains > 0, "no seed completed a cascade");
    }

    #[test]
    fn test_cascade_limit_stops_long_chains() {
        // A full 4x4 board never offers a free cell, and with at most four
        // chain cells every push still has candidates, so the limit is what
        // ends the chain
        for limit in 1..=3 {
            for seed in 0..8 {
                let state = SpatialState::new(
                    GridConfig::with_side(4)
                        .policy(CollisionPolicy::Cascade)
                        .cascade_limit(limit)
                        .seed(seed),
                );
                crowd(&state, &[]);
                let before = state.snapshot();

                assert_eq!(
                    state.move_in(&id(5), Direction::Left),
                    Err(GridError::CascadeLimitExceeded { limit })
                );
                assert_eq!(state.snapshot(), before);
            }
        }
    }

    #[test]
    fn test_failed_cascade_leaves_state_untouched() {
        // Nearly full 3x3 board: every cell neighbours every other, so chains
        // either find the single hole or run out of candidates
        for seed in 0..64 {
            let state = SpatialState::new(
                GridConfig::with_side(3)
                    .policy(CollisionPolicy::Cascade)
                    .cascade_limit(2)
                    .seed(seed),
            );
            for n in 0..8 {
                state.join(&id(n)).unwrap();
            }
            let before = state.snapshot();

            match state.move_in(&id(0), Direction::Up) {
                Ok(outcome) => {
                    assert!(outcome.displaced.len() <= 2);
                    assert_eq!(state.current_position(&id(0)), Some(outcome.position));
                }
                Err(GridError::MoveRejected { .. }) | Err(GridError::CascadeLimitExceeded { .. }) => {
                    assert_eq!(state.snapshot(), before);
                }
                Err(other) => panic!("unexpected error {other}"),
            }
            assert_eq!(state.player_count(), 8);
            assert_consistent(&state);
        }
    }

    #[test]
    fn test_full_board_cascade_is_rejected() {
        let state = SpatialState::new(
            GridConfig::with_side(3)
                .policy(CollisionPolicy::Cascade)
                .cascade_limit(100)
                .seed(12),
        );
        for n in 0..9 {
            state.join(&id(n)).unwrap();
        }
        let before = state.snapshot();

        assert!(matches!(
            state.move_in(&id(4), Direction::Left),
            Err(GridError::MoveRejected { .. })
        ));
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_random_operations_keep_board_consistent() {
        let side = 4;
        let state = state(side, CollisionPolicy::Cascade, 13);
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..2_000 {
            let player = id(rng.gen_range(0..24));
            match rng.gen_range(0..10) {
                0 => {
                    state.leave(&player);
                }
                1..=2 => {
                    let _ = state.join(&player);
                }
                _ => {
                    let _ = state.move_player(&player, rng.gen_range(-1..=1), rng.gen_range(-1..=1));
                }
            }
            assert_consistent(&state);
            assert!(state.player_count() <= side * side);
        }
    }

    #[test]
    fn test_concurrent_moves_keep_board_consistent() {
        let state = Arc::new(state(8, CollisionPolicy::Cascade, 14));
        let players: Vec<PlayerId> = (0..16).map(id).collect();
        for player in &players {
            state.join(player).unwrap();
        }

        let handles: Vec<_> = players
            .into_iter()
            .enumerate()
            .map(|(n, player)| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(n as u64);
                    for _ in 0..500 {
                        let direction = Direction::ALL[rng.gen_range(0..8)];
                        let _ = state.move_in(&player, direction);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(state.player_count(), 16);
        assert_consistent(&state);
    }
}
