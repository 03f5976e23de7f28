//! Game model and wire format shared by the maze server and its clients

pub mod board;
pub mod config;
pub mod error;
pub mod framing;
pub mod maze;
pub mod protocol;
pub mod types;

pub use board::{Board, MatchPhase, MoveOutcome, PlayerState, WIN_THRESHOLD};
pub use config::{GameConfig, DEFAULT_PORT};
pub use error::{ConfigError, GameError, GameResult, NetError, ProtocolError};
pub use maze::{Grid, MazeBuilder};
pub use protocol::{PlayerMove, ServerFrame, CLIENT_FRAME_SIZE, SERVER_FRAME_SIZE};
pub use types::{Direction, PlayerId, Position, Tile, PLAYER_COUNT};
