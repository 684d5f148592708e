use crate::dump::DumpFormat;
use crate::spatial::CollisionPolicy;
use gridworld_shared::{board_side_for, DEFAULT_CASCADE_LIMIT, DEFAULT_MAX_PLAYERS, DEFAULT_PORT};
use std::path::PathBuf;
use std::time::Duration;

/// Board parameters fixed at construction
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Side length of the square board
    pub side: usize,
    /// How a move into an occupied cell is resolved
    pub policy: CollisionPolicy,
    /// Most players a single move may displace
    pub cascade_limit: usize,
    /// Seed for spawn and displacement sampling; entropy when absent
    pub seed: Option<u64>,
}

impl GridConfig {
    pub fn from_max_players(max_players: usize) -> Self {
        Self {
            side: board_side_for(max_players),
            ..Self::default()
        }
    }

    pub fn with_side(side: usize) -> Self {
        Self {
            side,
            ..Self::default()
        }
    }

    pub fn policy(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn cascade_limit(mut self, cascade_limit: usize) -> Self {
        self.cascade_limit = cascade_limit;
        self
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            side: board_side_for(DEFAULT_MAX_PLAYERS),
            policy: CollisionPolicy::Cascade,
            cascade_limit: DEFAULT_CASCADE_LIMIT,
            seed: None,
        }
    }
}

/// Periodic state dump settings
#[derive(Debug, Clone)]
pub struct DumpConfig {
    pub path: PathBuf,
    pub interval: Duration,
    pub format: DumpFormat,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state.txt"),
            interval: Duration::from_millis(500),
            format: DumpFormat::Text,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to, `host:port`
    pub bind_address: String,
    pub grid: GridConfig,
    /// State dump, disabled when `None`
    pub dump: Option<DumpConfig>,
    /// Print the board and stop the server on the first `SHOW`
    pub exit_on_show: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("127.0.0.1:{}", DEFAULT_PORT),
            grid: GridConfig::default(),
            dump: Some(DumpConfig::default()),
            exit_on_show: false,
        }
    }
}
