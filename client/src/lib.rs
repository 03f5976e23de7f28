//! # Maze Race Client Library
//!
//! The player-facing side of the maze race. The server is authoritative, so
//! the client never moves anyone on its own: it sends a move request and
//! redraws when the server reports what happened.
//!
//! ## Module Organization
//!
//! ### Network (`network`)
//! Handshake, snapshot download and the background receive task. Decoded
//! frames come out of a channel as `ServerEvent`s.
//!
//! ### Game (`game`)
//! The local board, fed only by server events, plus the wall pre-check
//! applied before a request is sent.
//!
//! ### Input (`input`)
//! WASD and arrow keys, limited to one move per repeat interval.
//!
//! ### Rendering (`rendering`)
//! Fog-of-war drawing of the maze, players and collectible, and a score line.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientGame;
//! use client::network::ClientSession;
//! use shared::{Direction, GameConfig};
//!
//! # async fn play() -> Result<(), shared::NetError> {
//! let config = GameConfig::default();
//! let (session, board, mut events) = ClientSession::connect("127.0.0.1:42042", &config).await?;
//! let mut game = ClientGame::new(board, session.player_id());
//!
//! if let Some(target) = game.target_for(Direction::Right) {
//!     session.send_move(target).await?;
//! }
//! while let Some(event) = events.recv().await {
//!     game.apply(event);
//! }
//! session.close().await;
//! # Ok(())
//! # }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
