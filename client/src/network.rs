//! Client side of the maze protocol: handshake, snapshot and the receive task

use log::{debug, info, warn};
use shared::framing::{read_exact_vec, read_frame, write_frame};
use shared::protocol::snapshot_len;
use shared::{
    Board, GameConfig, NetError, PlayerId, PlayerMove, Position, ServerFrame, SERVER_FRAME_SIZE,
};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;

/// What the receive task reports to the game view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    PlayerMoved {
        player: PlayerId,
        position: Position,
    },
    CollectibleTaken {
        player: PlayerId,
        position: Position,
        collectible: Position,
    },
    GameWon {
        winner: PlayerId,
    },
    /// The server closed the connection or sent something unreadable.
    Disconnected(String),
}

impl ServerEvent {
    fn from_frame(frame: ServerFrame) -> Option<Self> {
        match frame {
            ServerFrame::Move { player, position } => {
                Some(ServerEvent::PlayerMoved { player, position })
            }
            ServerFrame::Collected {
                player,
                position,
                collectible,
            } => Some(ServerEvent::CollectibleTaken {
                player,
                position,
                collectible,
            }),
            ServerFrame::Win { winner } => Some(ServerEvent::GameWon { winner }),
            ServerFrame::Ping => None,
        }
    }
}

/// Sends the token, reads the id byte, then blocks until the whole maze snapshot is in.
///
/// A server that closes the socket instead of answering has rejected the token.
pub async fn handshake<S>(stream: &mut S, config: &GameConfig) -> Result<(PlayerId, Board), NetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_frame(stream, config.token_bytes()).await?;

    let [id_byte] = match read_frame::<_, 1>(stream).await {
        Ok(byte) => byte,
        Err(e) if e.is_disconnect() => return Err(NetError::AuthRejected),
        Err(e) => return Err(e),
    };
    let id = PlayerId::try_from(id_byte)?;
    info!("Assigned player id {}", id);

    let snapshot = read_exact_vec(stream, snapshot_len(config.columns, config.rows)).await?;
    let board = Board::from_snapshot(config.columns, config.rows, &snapshot)?;
    debug!("Maze snapshot received ({} bytes)", snapshot.len());
    Ok((id, board))
}

/// Decodes server frames until the stream ends, forwarding them as events.
///
/// Pings are swallowed. The last event is always `Disconnected`.
pub async fn receive_frames<R>(mut reader: R, events: mpsc::UnboundedSender<ServerEvent>)
where
    R: AsyncRead + Unpin,
{
    let reason = loop {
        let frame = match read_frame::<_, SERVER_FRAME_SIZE>(&mut reader).await {
            Ok(frame) => frame,
            Err(e) if e.is_disconnect() => break "server closed the connection".to_string(),
            Err(e) => break e.to_string(),
        };
        let frame = match ServerFrame::decode(&frame) {
            Ok(frame) => frame,
            Err(e) => break e.to_string(),
        };

        if let Some(event) = ServerEvent::from_frame(frame) {
            if events.send(event).is_err() {
                return;
            }
        }
    };

    info!("Receive task stopped: {}", reason);
    let _ = events.send(ServerEvent::Disconnected(reason));
}

/// A seat in a running match
pub struct ClientSession {
    id: PlayerId,
    writer: Mutex<Option<OwnedWriteHalf>>,
    receiver: AbortHandle,
}

impl ClientSession {
    /// Connects, completes the handshake and starts the background receive task.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn connect(
        addr: &str,
        config: &GameConfig,
    ) -> Result<(Self, Board, mpsc::UnboundedReceiver<ServerEvent>), NetError> {
        let mut stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);

        let (id, board) = handshake(&mut stream, config).await?;

        let (reader, writer) = stream.into_split();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let receiver = tokio::spawn(receive_frames(reader, events_tx)).abort_handle();

        let session = ClientSession {
            id,
            writer: Mutex::new(Some(writer)),
            receiver,
        };
        Ok((session, board, events_rx))
    }

    pub fn player_id(&self) -> PlayerId {
        self.id
    }

    /// Sends a move request for the local player. The server decides whether it is legal.
    pub async fn send_move(&self, target: Position) -> Result<(), NetError> {
        let frame = PlayerMove::new(self.id, target).encode_request()?;
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(writer) => write_frame(writer, &frame).await,
            None => Err(NetError::Io(io::ErrorKind::NotConnected.into())),
        }
    }

    /// Stops the receive task and closes the socket. Safe to call more than once.
    pub async fn close(&self) {
        self.receiver.abort();
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                warn!("Error while closing connection: {}", e);
            }
            info!("Session closed");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}
