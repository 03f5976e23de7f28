//! Headless bot that takes a seat and wanders the maze at random.
//! Start four of them to get a match going without opening windows.

use clap::Parser;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use shared::framing::{read_exact_vec, read_frame, write_frame};
use shared::protocol::snapshot_len;
use shared::{
    Board, Direction, GameConfig, NetError, PlayerId, PlayerMove, ServerFrame, SERVER_FRAME_SIZE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:42042")]
    server: String,
    /// Milliseconds between moves
    #[clap(short, long, default_value = "250")]
    delay_ms: u64,
    /// JSON file with columns, rows and auth_token
    #[clap(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let game = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };

    let mut stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);
    write_frame(&mut stream, game.token_bytes()).await?;

    let [id_byte] = read_frame::<_, 1>(&mut stream).await.map_err(|e| {
        if e.is_disconnect() {
            NetError::AuthRejected
        } else {
            e
        }
    })?;
    let id = PlayerId::try_from(id_byte)?;
    info!("Seated as player {}, waiting for the maze", id);

    let snapshot = read_exact_vec(&mut stream, snapshot_len(game.columns, game.rows)).await?;
    let board = Arc::new(Mutex::new(Board::from_snapshot(
        game.columns,
        game.rows,
        &snapshot,
    )?));
    info!("Maze received, starting to wander");

    let (mut reader, mut writer) = stream.into_split();
    let receiver = {
        let board = Arc::clone(&board);
        tokio::spawn(async move {
            loop {
                let frame = read_frame::<_, SERVER_FRAME_SIZE>(&mut reader).await?;
                let mut board = board.lock().await;
                match ServerFrame::decode(&frame)? {
                    ServerFrame::Move { player, position } => {
                        board.apply_remote_move(player, position)?
                    }
                    ServerFrame::Collected {
                        player,
                        position,
                        collectible,
                    } => {
                        board.apply_collection(player, position, collectible)?;
                        info!(
                            "Player {} has {} collectibles",
                            player,
                            board.player(player).collected
                        );
                    }
                    ServerFrame::Win { winner } => {
                        board.apply_win(winner);
                        info!("Player {} won", winner);
                        return Ok::<(), NetError>(());
                    }
                    ServerFrame::Ping => debug!("ping"),
                }
            }
        })
    };

    let mut rng = rand::thread_rng();
    while !receiver.is_finished() {
        let target = {
            let board = board.lock().await;
            let here = board.player(id).position;
            let options: Vec<_> = Direction::ALL
                .iter()
                .filter_map(|d| here.step(*d))
                .filter(|p| board.grid().is_passable(*p))
                .collect();
            options.choose(&mut rng).copied()
        };

        if let Some(target) = target {
            let request = PlayerMove::new(id, target).encode_request()?;
            if let Err(e) = write_frame(&mut writer, &request).await {
                warn!("Send failed: {}", e);
                break;
            }
        }
        sleep(Duration::from_millis(args.delay_ms)).await;
    }

    writer.shutdown().await.ok();
    match receiver.await? {
        Ok(()) => info!("Match over"),
        Err(e) => warn!("Connection ended: {}", e),
    }
    Ok(())
}
