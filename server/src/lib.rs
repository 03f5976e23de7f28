//! # Maze Race Server Library
//!
//! The authoritative server for a four-player maze race. It generates the
//! maze, owns the only writable copy of the board, validates every move and
//! tells clients what happened using the bit-packed frames from `shared`.
//!
//! ## Match Lifecycle
//!
//! 1. A fresh board and an empty lobby are created.
//! 2. Connections send the shared token and receive a player id byte. A
//!    connection that fails before the lobby fills gives its id back.
//! 3. Once all four seats are taken the first collectible is placed and the
//!    maze snapshot goes out to every player.
//! 4. Connection tasks push decoded moves onto one FIFO queue; the game loop
//!    applies them one at a time and fans out the resulting frames.
//! 5. A win, or every player leaving, closes all sockets and the cycle starts
//!    over with a new maze.
//!
//! ## Module Organization
//!
//! ### Client Manager (`client_manager`)
//! Seat allocation, the four-player rendezvous and per-connection outbound queues.
//!
//! ### Game (`game`)
//! The single consumer of the move queue and the outcome-to-frame mapping.
//!
//! ### Network (`network`)
//! The accept loop, the handshake and the reader/writer halves of each connection.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
