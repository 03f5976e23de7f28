//! Player seat allocation and per-connection outbound queues
//!
//! This module owns the server side of a match lobby:
//! - The pool of player ids {0, 1, 2, 3}, handed out in order
//! - The rendezvous: a match starts only once all four seats are taken
//! - Fan-out of encoded frames to every connection's writer task
//!
//! A fresh `ClientManager` is created for every match, so ids never leak from
//! one match into the next.

use log::{debug, info, warn};
use shared::{NetError, PlayerId, SERVER_FRAME_SIZE};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use tokio::sync::{mpsc, watch};

/// Bytes queued for one connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// The single handshake byte carrying the assigned id
    Assigned(PlayerId),
    /// The maze snapshot, sent once when the match starts
    Snapshot(Vec<u8>),
    /// Any fixed-size server frame
    Frame([u8; SERVER_FRAME_SIZE]),
}

impl Outgoing {
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Outgoing::Assigned(id) => vec![id.get()],
            Outgoing::Snapshot(bytes) => bytes.clone(),
            Outgoing::Frame(frame) => frame.to_vec(),
        }
    }
}

/// Which connections a frame goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    Everyone,
    Only(PlayerId),
}

/// An admitted connection
#[derive(Debug)]
pub struct Client {
    /// Seat assigned during the handshake
    pub id: PlayerId,
    /// Peer address, kept for logging
    pub addr: SocketAddr,
    outbound: mpsc::UnboundedSender<Outgoing>,
}

impl Client {
    /// Queues a message for this client's writer.
    ///
    /// Returns false once the writer has gone away; the connection task
    /// reports the disconnect itself, so the caller only needs to log.
    pub fn send(&self, message: Outgoing) -> bool {
        self.outbound.send(message).is_ok()
    }
}

/// Manages the seats of a single match
///
/// Ids come from a FIFO pool. A connection that leaves before the match has
/// started gives its id back so that a reconnect can take it; after the start
/// the seat stays taken for the rest of the match.
pub struct ClientManager {
    /// Admitted connections by seat
    clients: HashMap<PlayerId, Client>,
    /// Ids not yet handed out
    available_ids: VecDeque<PlayerId>,
    /// Set once the rendezvous has completed
    started: bool,
    /// Publishes the number of admitted connections
    admitted: watch::Sender<usize>,
}

impl ClientManager {
    /// Creates a lobby with all four ids available
    pub fn new() -> Self {
        let (admitted, _) = watch::channel(0);
        Self {
            clients: HashMap::new(),
            available_ids: PlayerId::ALL.into_iter().collect(),
            started: false,
            admitted,
        }
    }

    /// Watches the admitted-connection count.
    ///
    /// The accept loop waits on this instead of polling the lobby.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.admitted.subscribe()
    }

    /// Takes the next free id and registers the connection.
    ///
    /// The id byte is queued on `outbound` before anything else can be, so
    /// it is always the first byte the client receives after its token.
    pub fn admit(
        &mut self,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Outgoing>,
    ) -> Result<PlayerId, NetError> {
        if self.started {
            return Err(NetError::NoPlayerIdAvailable);
        }
        let id = self
            .available_ids
            .pop_front()
            .ok_or(NetError::NoPlayerIdAvailable)?;

        let client = Client { id, addr, outbound };
        if !client.send(Outgoing::Assigned(id)) {
            self.available_ids.push_front(id);
            return Err(NetError::Io(std::io::ErrorKind::BrokenPipe.into()));
        }

        info!("Player {} joined from {}", id, addr);
        self.clients.insert(id, client);
        self.publish_count();
        Ok(id)
    }

    /// Removes a connection.
    ///
    /// Returns true when the id went back into the pool, which only happens
    /// before the match has started.
    pub fn remove_client(&mut self, id: PlayerId) -> bool {
        let Some(client) = self.clients.remove(&id) else {
            return false;
        };
        self.publish_count();

        if self.started {
            info!("Player {} ({}) left the match", id, client.addr);
            false
        } else {
            info!("Player {} ({}) left the lobby, id released", id, client.addr);
            self.available_ids.push_back(id);
            true
        }
    }

    /// Closes the rendezvous when every seat is taken. Returns true exactly once.
    pub fn try_start(&mut self) -> bool {
        if self.started || self.clients.len() < PlayerId::ALL.len() {
            return false;
        }
        self.started = true;
        info!("All {} players connected, starting match", self.clients.len());
        true
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Queues `message` for the selected connections.
    pub fn deliver(&self, message: &Outgoing, recipients: Recipients) {
        match recipients {
            Recipients::Everyone => {
                for client in self.clients.values() {
                    if !client.send(message.clone()) {
                        debug!("Player {} writer is gone, skipping", client.id);
                    }
                }
            }
            Recipients::Only(id) => match self.clients.get(&id) {
                Some(client) => {
                    if !client.send(message.clone()) {
                        debug!("Player {} writer is gone, skipping", id);
                    }
                }
                None => warn!("No connection for player {}", id),
            },
        }
    }

    /// Drops every outbound queue. Writers flush what is queued and then close their sockets.
    pub fn close_all(&mut self) {
        let count = self.clients.len();
        self.clients.clear();
        self.publish_count();
        debug!("Closed {} client queues", count);
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.clients.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn publish_count(&self) {
        self.admitted.send_replace(self.clients.len());
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}
