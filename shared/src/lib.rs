use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_MAX_PLAYERS: usize = 30;
pub const DEFAULT_PORT: u16 = 4444;
pub const DEFAULT_CASCADE_LIMIT: usize = 8;

/// Side length of the board for a configured maximum player count.
pub fn board_side_for(max_players: usize) -> usize {
    (max_players / 2).max(1)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("missing direction")]
    MissingDirection,
    #[error("invalid direction `{0}`")]
    InvalidDirection(String),
    #[error("invalid position `{0}`")]
    InvalidPosition(String),
    #[error("unrecognized reply `{0}`")]
    UnrecognizedReply(String),
}

/// Opaque player identifier, `<ip>/<port>` of the player's connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_addr(addr: SocketAddr) -> Self {
        Self(format!("{}/{}", addr.ip(), addr.port()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cell coordinate on a toroidal board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Wraps an arbitrary coordinate onto a board of the given side.
    pub fn wrapped(x: i64, y: i64, side: usize) -> Self {
        let side = side as i64;
        Self {
            x: x.rem_euclid(side) as usize,
            y: y.rem_euclid(side) as usize,
        }
    }

    /// Applies a displacement with toroidal wraparound.
    pub fn offset(self, dx: i32, dy: i32, side: usize) -> Self {
        Self::wrapped(self.x as i64 + dx as i64, self.y as i64 + dy as i64, side)
    }

    pub fn in_bounds(self, side: usize) -> bool {
        self.x < side && self.y < side
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl FromStr for Position {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidPosition(s.to_string());
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let (x, y) = inner.split_once(',').ok_or_else(invalid)?;
        let x = x.trim().parse().map_err(|_| invalid())?;
        let y = y.trim().parse().map_err(|_| invalid())?;
        Ok(Position { x, y })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    UpRight,
    UpLeft,
    DownRight,
    DownLeft,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::UpRight,
        Direction::UpLeft,
        Direction::DownRight,
        Direction::DownLeft,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::UpRight => (1, 1),
            Direction::UpLeft => (-1, 1),
            Direction::DownRight => (1, -1),
            Direction::DownLeft => (-1, -1),
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
            Direction::UpRight => "UR",
            Direction::UpLeft => "UL",
            Direction::DownRight => "DR",
            Direction::DownLeft => "DL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Direction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::ALL
            .into_iter()
            .find(|direction| direction.keyword() == s)
            .ok_or_else(|| ProtocolError::InvalidDirection(s.to_string()))
    }
}

/// Commands a client sends, one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Show,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move(direction) => write!(f, "MOVE {}", direction),
            Command::Show => f.write_str("SHOW"),
        }
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        match words.next() {
            None => Err(ProtocolError::Empty),
            Some("MOVE") => {
                let direction = words.next().ok_or(ProtocolError::MissingDirection)?;
                Ok(Command::Move(direction.parse()?))
            }
            Some("SHOW") => Ok(Command::Show),
            Some(other) => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

const WELCOME_PREFIX: &str = "Welcome ";
const WELCOME_INFIX: &str = ", your position is: ";
const FULL_PREFIX: &str = "Server full, ";
const FULL_SUFFIX: &str = " could not join.";
const MOVED_PREFIX: &str = "Move successful. ";
const MOVED_INFIX: &str = ", your new position is: ";
const FAILED_PREFIX: &str = "You could not make the move, ";
const INVALID_PREFIX: &str = "Invalid movement. ";

/// Single-line replies the server sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Welcome { player: PlayerId, position: Position },
    ServerFull { player: PlayerId },
    Moved { player: PlayerId, position: Position },
    MoveFailed { player: PlayerId, reason: String },
    InvalidMove { player: PlayerId },
}

impl Reply {
    pub fn is_move_success(&self) -> bool {
        matches!(self, Reply::Moved { .. })
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Welcome { player, position } => {
                write!(f, "{WELCOME_PREFIX}{player}{WELCOME_INFIX}{position}.")
            }
            Reply::ServerFull { player } => write!(f, "{FULL_PREFIX}{player}{FULL_SUFFIX}"),
            Reply::Moved { player, position } => {
                write!(f, "{MOVED_PREFIX}{player}{MOVED_INFIX}{position}.")
            }
            Reply::MoveFailed { player, reason } => {
                write!(f, "{FAILED_PREFIX}{player}: {reason}.")
            }
            Reply::InvalidMove { player } => write!(f, "{INVALID_PREFIX}{player}"),
        }
    }
}

fn split_position(rest: &str, infix: &str) -> Option<(PlayerId, Position)> {
    let (player, position) = rest.rsplit_once(infix)?;
    let position = position.strip_suffix('.')?.parse().ok()?;
    Some((PlayerId::new(player), position))
}

impl FromStr for Reply {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end();
        let reply = if let Some(rest) = line.strip_prefix(WELCOME_PREFIX) {
            split_position(rest, WELCOME_INFIX)
                .map(|(player, position)| Reply::Welcome { player, position })
        } else if let Some(rest) = line.strip_prefix(MOVED_PREFIX) {
            split_position(rest, MOVED_INFIX)
                .map(|(player, position)| Reply::Moved { player, position })
        } else if let Some(rest) = line.strip_prefix(FULL_PREFIX) {
            rest.strip_suffix(FULL_SUFFIX).map(|player| Reply::ServerFull {
                player: PlayerId::new(player),
            })
        } else if let Some(rest) = line.strip_prefix(FAILED_PREFIX) {
            rest.strip_suffix('.')
                .and_then(|rest| rest.split_once(": "))
                .map(|(player, reason)| Reply::MoveFailed {
                    player: PlayerId::new(player),
                    reason: reason.to_string(),
                })
        } else {
            line.strip_prefix(INVALID_PREFIX)
                .map(|player| Reply::InvalidMove {
                    player: PlayerId::new(player),
                })
        };

        reply.ok_or_else(|| ProtocolError::UnrecognizedReply(line.to_string()))
    }
}
