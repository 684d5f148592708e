use clap::Parser;
use gridworld_client::driver::{self, DriverConfig};
use gridworld_client::network::ClientError;
use gridworld_shared::DEFAULT_PORT;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of players to connect
    #[arg(short, long, default_value = "10")]
    players: usize,

    /// Number of moves per player
    #[arg(short, long, default_value = "5000")]
    moves: usize,

    /// Server address to connect to
    #[arg(short, long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Print the board once every player is done
    #[arg(long)]
    show: bool,

    /// Seed for the random moves
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!("Connecting {} players to: {}", args.players, args.server);

    let config = DriverConfig {
        server: args.server,
        players: args.players,
        moves_per_player: args.moves,
        show: args.show,
        seed: args.seed,
    };
    let report = driver::run(&config).await?;

    println!(
        "Players connected: {}, refused: {}",
        report.connected, report.refused
    );
    println!(
        "Moves: {} succeeded, {} failed",
        report.successful_moves, report.failed_moves
    );
    if let Some(board) = report.board {
        println!("{}", board);
    }

    Ok(())
}
