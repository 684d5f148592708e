//! # Grid World Server Library
//!
//! This library provides the authoritative server for the multiplayer grid
//! world. Players connect over TCP, send newline-terminated text commands,
//! and the server keeps every player's cell on a shared toroidal board.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Board
//! The server holds the only copy of the board. Clients never report their
//! own position; they ask to move and are told where they ended up.
//!
//! ### Collision Resolution
//! A move into an occupied cell is either rejected or resolved by pushing the
//! occupant to a neighbouring cell first, possibly along a chain of players.
//! The chain is capped so adversarial crowding cannot make a move run away.
//!
//! ### Client Lifecycle
//! - Joining places the player on a random free cell, or refuses it when the
//!   board is full
//! - Each move command gets exactly one reply line
//! - Disconnecting frees the player's cell for the next client
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! Every client is served by its own tokio task on the multi-threaded
//! runtime, so moves from different players run in parallel.
//!
//! ### Coarse Board Lock
//! Board and position table sit behind one mutex in
//! [`spatial::SpatialState`]. Each join, move (including every step of a
//! displacement chain), leave and snapshot holds it exactly once, which makes
//! all operations linearizable. The lock is never held across socket I/O.
//!
//! ## Module Organization
//!
//! - `board`: cell occupancy grid
//! - `position_table`: player to cell lookup
//! - `spatial`: the shared state manager and the displacement algorithm
//! - `snapshot`: consistent copies of the board, text rendering and checks
//! - `connection`: per-client command loop
//! - `network`: TCP listener and server loop
//! - `dump`: periodic state dump to a file
//! - `config` and `error`: settings and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use gridworld_server::config::ServerConfig;
//! use gridworld_server::network::Server;
//! use gridworld_server::spatial::SpatialState;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig::default();
//!     let state = Arc::new(SpatialState::new(config.grid.clone()));
//!
//!     // Accepts players and dumps the board to state.txt every 500ms
//!     let mut server = Server::new(config, state).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod config;
pub mod connection;
pub mod dump;
pub mod error;
pub mod network;
pub mod position_table;
pub mod snapshot;
pub mod spatial;
