//! # Grid World Client Library
//!
//! Client side of the grid world text protocol, used to drive load against a
//! running server. Each simulated player opens its own TCP connection, reads
//! its welcome line, and then sends random `MOVE` commands, waiting for the
//! reply to each one.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! A [`network::GameConnection`] wraps one stream: it writes commands as text
//! lines and parses reply lines back into [`gridworld_shared::Reply`].
//!
//! ### Input Module (`input`)
//! [`input::RandomMover`] yields a fixed number of random moves, optionally
//! from a seed so a run can be repeated.
//!
//! ### Driver Module (`driver`)
//! [`driver::run`] connects all players first, runs their moves in parallel,
//! and sums up how many moves succeeded.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use gridworld_client::driver::{run, DriverConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = DriverConfig {
//!         server: "127.0.0.1:4444".to_string(),
//!         players: 10,
//!         moves_per_player: 5000,
//!         show: true,
//!         seed: None,
//!     };
//!
//!     let report = run(&config).await?;
//!     println!("{} of {} moves succeeded", report.successful_moves, report.total_moves());
//!     Ok(())
//! }
//! ```

pub mod driver;
pub mod input;
pub mod network;
