use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig};
use shared::{GameConfig, DEFAULT_PORT};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Maze width in cells (overrides the config file)
    #[clap(short, long)]
    columns: Option<usize>,
    /// Maze height in cells (overrides the config file)
    #[clap(short, long)]
    rows: Option<usize>,
    /// Milliseconds between liveness pings
    #[clap(long, default_value = "2000")]
    ping_interval_ms: u64,
    /// JSON file with columns, rows and auth_token
    #[clap(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut game = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if let Some(columns) = args.columns {
        game.columns = columns;
    }
    if let Some(rows) = args.rows {
        game.rows = rows;
    }

    let bind: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let config = ServerConfig {
        bind,
        game,
        ping_interval: Duration::from_millis(args.ping_interval_ms),
        ..ServerConfig::default()
    };
    info!(
        "Starting maze server on {} with a {}x{} grid",
        config.bind, config.game.columns, config.game.rows
    );

    let mut server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
