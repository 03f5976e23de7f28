//! Error types shared by the server and the client

use std::io;
use thiserror::Error;

/// Failures of board construction and board operations.
///
/// A `Blocked` move is not an error; see [`crate::board::MoveOutcome`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("grid must be at least {min}x{min}, got {columns}x{rows}")]
    GridTooSmall {
        columns: usize,
        rows: usize,
        min: usize,
    },
    #[error("grid can be at most {max}x{max} on the wire, got {columns}x{rows}")]
    GridTooLarge {
        columns: usize,
        rows: usize,
        max: usize,
    },
    #[error("a {columns}x{rows} grid leaves no cell for the collectible once all players are seated")]
    NoRoomForCollectible { columns: usize, rows: usize },
    #[error("position ({row}, {col}) is outside the grid")]
    OutOfBounds { row: usize, col: usize },
    #[error("invalid player id {0}")]
    InvalidPlayerId(u8),
    #[error("no free floor cell left for the collectible")]
    NoFreeCell,
    #[error("match is not active")]
    MatchNotActive,
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Malformed or unexpected frames. Always fatal to the connection that sent them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid token {found:#05b}, expected {expected:#05b}")]
    InvalidToken { expected: u8, found: u8 },
    #[error("unknown token {0:#05b}")]
    UnknownToken(u8),
    #[error("{field} value {value} does not fit in {bits} bits")]
    FieldOutOfRange {
        field: &'static str,
        value: usize,
        bits: u32,
    },
    #[error("invalid tile code {0:#06b}")]
    InvalidTileCode(u8),
    #[error("snapshot must be {expected} bytes, got {found}")]
    SnapshotLength { expected: usize, found: usize },
    #[error("player {claimed} sent a move on the connection of player {assigned}")]
    PlayerMismatch { assigned: u8, claimed: u8 },
}

/// Everything that can end a single connection.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("server rejected the authentication token")]
    AuthRejected,
    #[error("no player id available")]
    NoPlayerIdAvailable,
    #[error("handshake timed out")]
    HandshakeTimeout,
}

impl NetError {
    /// Peer closed the stream or reset the connection.
    pub fn is_disconnect(&self) -> bool {
        match self {
            NetError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Problems reading a JSON configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] io::Error),
    #[error("could not parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type GameResult<T> = Result<T, GameError>;
