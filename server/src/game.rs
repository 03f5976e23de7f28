//! The match loop: drains the move queue and turns outcomes into frames

use crate::client_manager::{ClientManager, Outgoing, Recipients};
use log::{debug, error, info, warn};
use shared::{Board, GameError, MoveOutcome, PlayerId, PlayerMove, ServerFrame};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Everything connection tasks feed into the game loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Move(PlayerMove),
    Disconnected(PlayerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEnd {
    Won(PlayerId),
    /// Every player left, or the board could not continue.
    Aborted,
}

/// Frames produced by one resolved move, in send order.
pub fn frames_for(
    board: &Board,
    mv: PlayerMove,
    outcome: MoveOutcome,
) -> Vec<(ServerFrame, Recipients)> {
    let player = mv.player;
    match outcome {
        MoveOutcome::Accepted => vec![(
            ServerFrame::Move {
                player,
                position: mv.target,
            },
            Recipients::Everyone,
        )],
        MoveOutcome::Blocked => vec![(
            ServerFrame::Move {
                player,
                position: board.player(player).position,
            },
            Recipients::Only(player),
        )],
        MoveOutcome::Collected { collectible } => vec![(
            ServerFrame::Collected {
                player,
                position: mv.target,
                collectible,
            },
            Recipients::Everyone,
        )],
        MoveOutcome::Won => {
            let mut frames = Vec::with_capacity(2);
            if let Some(collectible) = board.collectible() {
                frames.push((
                    ServerFrame::Collected {
                        player,
                        position: mv.target,
                        collectible,
                    },
                    Recipients::Everyone,
                ));
            }
            frames.push((ServerFrame::Win { winner: player }, Recipients::Everyone));
            frames
        }
    }
}

/// Runs until a player wins or the match has to be abandoned.
///
/// This is the only consumer of the move queue, so moves are applied one at a
/// time in arrival order. Each move still takes the board's write lock so that
/// readers never see a half-applied collection.
pub async fn run_game_loop(
    board: Arc<RwLock<Board>>,
    clients: Arc<RwLock<ClientManager>>,
    mut events: mpsc::UnboundedReceiver<GameEvent>,
) -> MatchEnd {
    while let Some(event) = events.recv().await {
        match event {
            GameEvent::Move(mv) => {
                let (outcome, frames) = {
                    let mut board = board.write().await;
                    match board.attempt_move(mv.player, mv.target) {
                        Ok(outcome) => (outcome, frames_for(&board, mv, outcome)),
                        Err(GameError::NoFreeCell) => {
                            error!("No free cell left for the collectible, aborting match");
                            return MatchEnd::Aborted;
                        }
                        Err(e) => {
                            warn!("Dropping move from player {}: {}", mv.player, e);
                            continue;
                        }
                    }
                };
                debug!("Player {} -> {}: {:?}", mv.player, mv.target, outcome);

                let clients = clients.read().await;
                for (frame, recipients) in frames {
                    match frame.encode() {
                        Ok(bytes) => clients.deliver(&Outgoing::Frame(bytes), recipients),
                        Err(e) => error!("Failed to encode {:?}: {}", frame, e),
                    }
                }

                if outcome == MoveOutcome::Won {
                    return MatchEnd::Won(mv.player);
                }
            }
            GameEvent::Disconnected(id) => {
                let remaining = {
                    let mut board = board.write().await;
                    board.set_connected(id, false);
                    board.connected_count()
                };
                info!("Player {} disconnected, {} still playing", id, remaining);
                if remaining == 0 {
                    return MatchEnd::Aborted;
                }
            }
        }
    }

    info!("Move queue closed");
    MatchEnd::Aborted
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Grid, Position, WIN_THRESHOLD};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    const P0: PlayerId = PlayerId::ALL[0];
    const P1: PlayerId = PlayerId::ALL[1];

    fn room() -> Board {
        let grid = Grid::from_ascii(&[
            "######", //
            "#.#..#", //
            "#....#", //
            "#....#", //
            "#....#", //
            "######",
        ])
        .unwrap();
        let spawns = [
            Position::new(1, 1),
            Position::new(1, 4),
            Position::new(4, 1),
            Position::new(4, 4),
        ];
        let mut board = Board::with_grid(grid, spawns, 7).unwrap();
        for id in PlayerId::ALL {
            board.set_connected(id, true);
        }
        board.start().unwrap();
        board
    }

    struct Lobby {
        clients: Arc<RwLock<ClientManager>>,
        receivers: Vec<mpsc::UnboundedReceiver<Outgoing>>,
    }

    impl Lobby {
        fn full() -> Self {
            let mut manager = ClientManager::new();
            let mut receivers = Vec::new();
            for port in 7000..7004 {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
                manager.admit(addr, tx).unwrap();
                rx.try_recv().unwrap();
                receivers.push(rx);
            }
            assert!(manager.try_start());
            Self {
                clients: Arc::new(RwLock::new(manager)),
                receivers,
            }
        }

        fn drain(&mut self, seat: usize) -> Vec<ServerFrame> {
            let mut frames = Vec::new();
            while let Ok(Outgoing::Frame(bytes)) = self.receivers[seat].try_recv() {
                frames.push(ServerFrame::decode(&bytes).unwrap());
            }
            frames
        }
    }

    #[test]
    fn test_blocked_echo_goes_to_mover_only() {
        let mut board = room();
        let mv = PlayerMove::new(P0, Position::new(1, 2));
        let outcome = board.attempt_move(mv.player, mv.target).unwrap();
        assert_eq!(outcome, MoveOutcome::Blocked);

        let frames = frames_for(&board, mv, outcome);
        assert_eq!(
            frames,
            vec![(
                ServerFrame::Move {
                    player: P0,
                    position: Position::new(1, 1)
                },
                Recipients::Only(P0)
            )]
        );
    }

    #[test]
    fn test_accepted_move_is_broadcast() {
        let mut board = room();
        board.place_collectible_at(Position::new(4, 3)).unwrap();
        let mv = PlayerMove::new(P0, Position::new(2, 1));
        let outcome = board.attempt_move(mv.player, mv.target).unwrap();

        let frames = frames_for(&board, mv, outcome);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1, Recipients::Everyone);
    }

    #[test]
    fn test_win_sends_collected_then_win() {
        let mut board = room();
        for _ in 1..WIN_THRESHOLD {
            let target = board.collectible().unwrap();
            board.attempt_move(P1, target).unwrap();
        }
        let target = board.collectible().unwrap();
        let mv = PlayerMove::new(P1, target);
        let outcome = board.attempt_move(mv.player, mv.target).unwrap();
        assert_eq!(outcome, MoveOutcome::Won);

        let frames = frames_for(&board, mv, outcome);
        assert_eq!(frames.len(), 2);
        assert!(matches!(
            frames[0].0,
            ServerFrame::Collected { player, position, .. } if player == P1 && position == target
        ));
        assert_eq!(frames[1].0, ServerFrame::Win { winner: P1 });
    }

    #[tokio::test]
    async fn test_loop_ends_on_win() {
        let board = Arc::new(RwLock::new(room()));
        let mut lobby = Lobby::full();
        let (tx, rx) = mpsc::unbounded_channel();
        let game = tokio::spawn(run_game_loop(board.clone(), lobby.clients.clone(), rx));

        for _ in 0..WIN_THRESHOLD {
            let target = board.read().await.collectible().unwrap();
            tx.send(GameEvent::Move(PlayerMove::new(P0, target))).unwrap();

            let Some(Outgoing::Frame(bytes)) = lobby.receivers[0].recv().await else {
                panic!("expected a frame");
            };
            assert!(matches!(
                ServerFrame::decode(&bytes).unwrap(),
                ServerFrame::Collected { player, position, .. } if player == P0 && position == target
            ));
        }

        assert_eq!(game.await.unwrap(), MatchEnd::Won(P0));
        assert_eq!(lobby.drain(0), vec![ServerFrame::Win { winner: P0 }]);
        for seat in 1..4 {
            let frames = lobby.drain(seat);
            assert_eq!(frames.len(), WIN_THRESHOLD as usize + 1);
            assert_eq!(frames.last(), Some(&ServerFrame::Win { winner: P0 }));
        }
    }

    #[tokio::test]
    async fn test_loop_aborts_when_everyone_leaves() {
        let board = Arc::new(RwLock::new(room()));
        let lobby = Lobby::full();
        let (tx, rx) = mpsc::unbounded_channel();

        for id in PlayerId::ALL {
            tx.send(GameEvent::Disconnected(id)).unwrap();
        }
        let end = run_game_loop(board.clone(), lobby.clients.clone(), rx).await;
        assert_eq!(end, MatchEnd::Aborted);
        assert_eq!(board.read().await.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_loop_keeps_running_after_partial_disconnect() {
        let board = Arc::new(RwLock::new(room()));
        let mut lobby = Lobby::full();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(GameEvent::Disconnected(P1)).unwrap();
        tx.send(GameEvent::Move(PlayerMove::new(P0, Position::new(1, 2))))
            .unwrap();
        drop(tx);

        let end = run_game_loop(board, lobby.clients.clone(), rx).await;
        assert_eq!(end, MatchEnd::Aborted);
        assert_eq!(
            lobby.drain(0),
            vec![ServerFrame::Move {
                player: P0,
                position: Position::new(1, 1)
            }]
        );
        assert!(lobby.drain(2).is_empty());
    }
}
