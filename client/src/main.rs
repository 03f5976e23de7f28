use clap::Parser;
use client::game::ClientGame;
use client::input::InputManager;
use client::network::ClientSession;
use client::rendering::Renderer;
use log::{error, info};
use macroquad::prelude::*;
use shared::GameConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:42042")]
    server: String,

    /// Maze width in cells, must match the server
    #[arg(short = 'c', long)]
    columns: Option<usize>,

    /// Maze height in cells, must match the server
    #[arg(short = 'r', long)]
    rows: Option<usize>,

    /// JSON file with columns, rows and auth_token
    #[arg(long)]
    config: Option<PathBuf>,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "640")]
    height: usize,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Maze Race".to_owned(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    if let Err(e) = run(Args::parse()).await {
        error!("Client error: {}", e);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if let Some(columns) = args.columns {
        config.columns = columns;
    }
    if let Some(rows) = args.rows {
        config.rows = rows;
    }
    config.validate()?;

    // networking runs on its own runtime; macroquad owns the main thread
    let runtime = tokio::runtime::Runtime::new()?;

    info!("Connecting to: {}", args.server);
    let pending = {
        let server = args.server.clone();
        let config = config.clone();
        runtime.spawn(async move { ClientSession::connect(&server, &config).await })
    };
    while !pending.is_finished() {
        if is_key_pressed(KeyCode::Escape) {
            pending.abort();
            return Ok(());
        }
        clear_background(Color::from_rgba(26, 26, 26, 255));
        draw_text("Waiting for four players...", 20.0, 40.0, 28.0, WHITE);
        next_frame().await;
    }
    let (session, board, mut events) = runtime.block_on(pending)??;
    info!("Controls: WASD or arrow keys to move, Esc to quit");

    let mut game = ClientGame::new(board, session.player_id());
    let mut input = InputManager::new();
    let renderer = Renderer::new(args.width, args.height);

    loop {
        while let Ok(event) = events.try_recv() {
            game.apply(event);
        }

        if input.quit_requested() {
            break;
        }

        if let Some(direction) = input.update() {
            if let Some(target) = game.target_for(direction) {
                match runtime.block_on(session.send_move(target)) {
                    Ok(()) => game.mark_sent(target),
                    Err(e) => error!("Error sending move: {}", e),
                }
            }
        }

        renderer.render(&game);
        next_frame().await;
    }

    runtime.block_on(session.close());
    Ok(())
}
