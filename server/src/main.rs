use clap::Parser;
use gridworld_server::config::{DumpConfig, GridConfig, ServerConfig};
use gridworld_server::dump::DumpFormat;
use gridworld_server::network::{Server, ServerError};
use gridworld_server::spatial::{CollisionPolicy, SpatialState};
use gridworld_shared::{board_side_for, DEFAULT_CASCADE_LIMIT, DEFAULT_MAX_PLAYERS, DEFAULT_PORT};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on (0 picks a free port)
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum player count; the board side is half of it
    #[arg(short, long, default_value_t = DEFAULT_MAX_PLAYERS)]
    max_players: usize,

    /// How a move into an occupied cell is resolved
    #[arg(long, value_enum, default_value_t = CollisionPolicy::Cascade)]
    policy: CollisionPolicy,

    /// Most players a single move may displace
    #[arg(long, default_value_t = DEFAULT_CASCADE_LIMIT)]
    cascade_limit: usize,

    /// Seed for placement and displacement sampling
    #[arg(long)]
    seed: Option<u64>,

    /// File the board state is dumped to
    #[arg(long, default_value = "state.txt")]
    dump_path: PathBuf,

    /// Milliseconds between state dumps
    #[arg(long, default_value_t = 500)]
    dump_interval_ms: u64,

    /// Format of the state dump
    #[arg(long, value_enum, default_value_t = DumpFormat::Text)]
    dump_format: DumpFormat,

    /// Disable the state dump
    #[arg(long)]
    no_dump: bool,

    /// Print the board and stop the server on the first SHOW command
    #[arg(long)]
    exit_on_show: bool,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let dump = (!self.no_dump).then(|| DumpConfig {
            path: self.dump_path,
            interval: Duration::from_millis(self.dump_interval_ms.max(1)),
            format: self.dump_format,
        });

        ServerConfig {
            bind_address: format!("{}:{}", self.host, self.port),
            grid: GridConfig {
                side: board_side_for(self.max_players),
                policy: self.policy,
                cascade_limit: self.cascade_limit,
                seed: self.seed,
            },
            dump,
            exit_on_show: self.exit_on_show,
        }
    }
}

/// Main-method of the application.
/// Parses command-line arguments, builds the shared board and runs the server until
/// Ctrl+C or a SHOW with `--exit-on-show`.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    env_logger::init();

    let config = Args::parse().into_config();
    let state = Arc::new(SpatialState::new(config.grid.clone()));
    info!(
        "Board is {}x{} ({} cells), collision policy {:?}",
        state.side(),
        state.side(),
        state.capacity(),
        state.policy()
    );

    let mut server = Server::new(config, state).await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
