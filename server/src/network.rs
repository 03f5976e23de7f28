//! Server network layer: accept loop, handshake and per-connection tasks

use crate::client_manager::{ClientManager, Outgoing, Recipients};
use crate::game::{run_game_loop, GameEvent, MatchEnd};
use log::{debug, error, info, trace, warn};
use shared::framing::{read_exact_vec, read_frame, write_frame};
use shared::{
    Board, GameConfig, GameError, MatchPhase, NetError, PlayerId, PlayerMove, ProtocolError,
    ServerFrame, CLIENT_FRAME_SIZE, DEFAULT_PORT,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinSet;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};

/// Server runtime settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub game: GameConfig,
    /// Gap between liveness pings on every connection
    pub ping_interval: Duration,
    /// How long a new connection may take to send its token
    pub handshake_timeout: Duration,
    /// Upper bound on one wait of the accept loop
    pub accept_poll: Duration,
    /// How long connection tasks get to flush after a match ends
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            game: GameConfig::default(),
            ping_interval: Duration::from_millis(2000),
            handshake_timeout: Duration::from_secs(5),
            accept_poll: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

/// What a connection task needs to know about the match it belongs to
struct MatchContext {
    token: Vec<u8>,
    columns: usize,
    rows: usize,
    ping_interval: Duration,
    handshake_timeout: Duration,
    clients: Arc<RwLock<ClientManager>>,
    events: mpsc::UnboundedSender<GameEvent>,
    phase: watch::Receiver<MatchPhase>,
}

/// Hosts matches back to back on one listening socket
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    matches_played: u64,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, NetError> {
        config.game.validate()?;
        let listener = TcpListener::bind(config.bind).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            config,
            matches_played: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn matches_played(&self) -> u64 {
        self.matches_played
    }

    /// Runs matches forever. A failed match is logged and the next one starts.
    pub async fn run(&mut self) -> Result<(), NetError> {
        info!("Server started successfully");
        loop {
            match self.run_match().await {
                Ok(MatchEnd::Won(winner)) => {
                    info!("Match {} won by player {}", self.matches_played, winner)
                }
                Ok(MatchEnd::Aborted) => info!("Match {} aborted", self.matches_played),
                Err(e) => error!("Match {} failed: {}", self.matches_played, e),
            }
        }
    }

    /// Plays one match: lobby, rendezvous, game loop, teardown.
    pub async fn run_match(&mut self) -> Result<MatchEnd, NetError> {
        self.matches_played += 1;
        let match_id = self.matches_played;
        let game = &self.config.game;

        let board = Arc::new(RwLock::new(Board::initialize(game.columns, game.rows)?));
        let clients = Arc::new(RwLock::new(ClientManager::new()));
        let (phase_tx, phase_rx) = watch::channel(MatchPhase::Setup);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut admitted = clients.read().await.subscribe();

        let context = Arc::new(MatchContext {
            token: game.token_bytes().to_vec(),
            columns: game.columns,
            rows: game.rows,
            ping_interval: self.config.ping_interval,
            handshake_timeout: self.config.handshake_timeout,
            clients: Arc::clone(&clients),
            events: events_tx,
            phase: phase_rx,
        });

        info!("Match {}: waiting for players", match_id);
        let mut handlers = JoinSet::new();

        while !clients.write().await.try_start() {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);
                        handlers.spawn(handle_connection(stream, addr, Arc::clone(&context)));
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                },
                changed = admitted.changed() => {
                    if changed.is_ok() {
                        trace!("{} players admitted", *admitted.borrow());
                    }
                }
                Some(_) = handlers.join_next(), if !handlers.is_empty() => {}
                _ = sleep(self.config.accept_poll) => {}
            }
        }

        let end = match start_match(&board, &clients, &phase_tx).await {
            Ok(()) => {
                // from here on only connection tasks hold the queue open
                drop(context);
                let end = run_game_loop(Arc::clone(&board), Arc::clone(&clients), events_rx).await;
                if let MatchEnd::Won(winner) = end {
                    phase_tx.send_replace(MatchPhase::Terminal { winner });
                }
                Ok(end)
            }
            Err(e) => Err(e),
        };

        clients.write().await.close_all();
        self.drain_handlers(&mut handlers).await;
        end
    }

    async fn drain_handlers(&self, handlers: &mut JoinSet<()>) {
        let drained = timeout(self.config.shutdown_grace, async {
            while handlers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            debug!("Aborting {} lingering connections", handlers.len());
            handlers.shutdown().await;
        }
    }
}

/// Drops the first collectible, opens the match and sends everyone the maze.
///
/// `Active` is published before any snapshot is queued, so a move sent by a
/// client that has just read the maze is never discarded as early.
async fn start_match(
    board: &RwLock<Board>,
    clients: &RwLock<ClientManager>,
    phase: &watch::Sender<MatchPhase>,
) -> Result<(), NetError> {
    let snapshot = {
        let mut board = board.write().await;
        for id in PlayerId::ALL {
            board.set_connected(id, true);
        }
        let collectible = board.start()?;
        debug!("First collectible at {}", collectible);
        board.snapshot()
    };
    phase.send_replace(MatchPhase::Active);
    clients
        .read()
        .await
        .deliver(&Outgoing::Snapshot(snapshot), Recipients::Everyone);
    Ok(())
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, context: Arc<MatchContext>) {
    match serve_connection(stream, addr, &context).await {
        Ok(()) => debug!("Connection {} closed", addr),
        Err(e) if e.is_disconnect() => info!("Connection {} dropped: {}", addr, e),
        Err(e) => warn!("Connection {} ended: {}", addr, e),
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    context: &MatchContext,
) -> Result<(), NetError> {
    let token = timeout(
        context.handshake_timeout,
        read_exact_vec(&mut stream, context.token.len()),
    )
    .await
    .map_err(|_| NetError::HandshakeTimeout)??;

    if token != context.token {
        // dropping the stream closes it without a reply
        return Err(NetError::AuthRejected);
    }

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let id = context.clients.write().await.admit(addr, outbound_tx)?;

    let (reader, writer) = stream.into_split();
    let result = tokio::select! {
        result = read_moves(reader, id, context) => result,
        result = write_frames(writer, outbound_rx, context.ping_interval) => result,
    };

    let released = context.clients.write().await.remove_client(id);
    if !released {
        // the game loop may already be gone
        let _ = context.events.send(GameEvent::Disconnected(id));
    }
    result
}

/// Checks a decoded request against the sending connection and the grid.
pub fn check_move(
    mv: PlayerMove,
    assigned: PlayerId,
    columns: usize,
    rows: usize,
) -> Result<(), NetError> {
    if mv.player != assigned {
        return Err(ProtocolError::PlayerMismatch {
            assigned: assigned.get(),
            claimed: mv.player.get(),
        }
        .into());
    }
    if mv.target.row >= rows || mv.target.col >= columns {
        return Err(GameError::OutOfBounds {
            row: mv.target.row,
            col: mv.target.col,
        }
        .into());
    }
    Ok(())
}

async fn read_moves(
    mut reader: OwnedReadHalf,
    id: PlayerId,
    context: &MatchContext,
) -> Result<(), NetError> {
    loop {
        let frame = read_frame::<_, CLIENT_FRAME_SIZE>(&mut reader).await?;
        let mv = PlayerMove::decode_request(&frame)?;
        check_move(mv, id, context.columns, context.rows)?;

        if *context.phase.borrow() != MatchPhase::Active {
            debug!("Discarding move from player {} outside an active match", id);
            continue;
        }
        trace!("Player {} requests {}", id, mv.target);
        if context.events.send(GameEvent::Move(mv)).is_err() {
            // game loop is gone; the match is over
            return Ok(());
        }
    }
}

/// Writes queued messages in order and pings once the snapshot is out.
///
/// Ends cleanly when the queue is closed, after everything queued was written.
async fn write_frames(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Outgoing>,
    ping_every: Duration,
) -> Result<(), NetError> {
    let ping = ServerFrame::Ping.encode()?;
    let mut ticker = interval(ping_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut in_game = false;
    loop {
        tokio::select! {
            biased;
            message = outbound.recv() => match message {
                Some(message) => {
                    write_frame(&mut writer, &message.bytes()).await?;
                    if matches!(message, Outgoing::Snapshot(_)) {
                        in_game = true;
                    }
                }
                None => {
                    writer.shutdown().await?;
                    return Ok(());
                }
            },
            _ = ticker.tick() => {
                // a ping ahead of the snapshot would corrupt it on the client
                if in_game {
                    write_frame(&mut writer, &ping).await?;
                }
            }
        }
    }
}
