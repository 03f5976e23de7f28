use crate::network::ServerEvent;
use log::{info, warn};
use shared::{Board, Direction, PlayerId, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Playing,
    Won(PlayerId),
    Disconnected(String),
}

/// Local view of the match, fed only by server events.
pub struct ClientGame {
    board: Board,
    me: PlayerId,
    status: Status,
    /// Last position we asked for, cleared when the server answers
    pending: Option<Position>,
}

impl ClientGame {
    pub fn new(board: Board, me: PlayerId) -> Self {
        Self {
            board,
            me,
            status: Status::Playing,
            pending: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn me(&self) -> PlayerId {
        self.me
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_over(&self) -> bool {
        self.status != Status::Playing
    }

    pub fn pending(&self) -> Option<Position> {
        self.pending
    }

    /// Turns a key press into a target cell.
    ///
    /// Walls we can already see are filtered out here to save a round trip;
    /// everything else goes to the server, which has the final say.
    pub fn target_for(&self, direction: Direction) -> Option<Position> {
        if self.is_over() {
            return None;
        }
        let here = self.board.player(self.me).position;
        let target = here.step(direction)?;
        let grid = self.board.grid();
        if !grid.contains(target) {
            return None;
        }
        if grid.is_visible(target) && !grid.is_passable(target) {
            return None;
        }
        Some(target)
    }

    pub fn mark_sent(&mut self, target: Position) {
        self.pending = Some(target);
    }

    pub fn apply(&mut self, event: ServerEvent) {
        let result = match event {
            ServerEvent::PlayerMoved { player, position } => {
                if player == self.me {
                    self.pending = None;
                }
                self.board.apply_remote_move(player, position)
            }
            ServerEvent::CollectibleTaken {
                player,
                position,
                collectible,
            } => {
                if player == self.me {
                    self.pending = None;
                }
                let result = self.board.apply_collection(player, position, collectible);
                info!(
                    "Player {} collected ({} total)",
                    player,
                    self.board.player(player).collected
                );
                result
            }
            ServerEvent::GameWon { winner } => {
                self.board.apply_win(winner);
                self.board.reveal_all();
                self.status = Status::Won(winner);
                Ok(())
            }
            ServerEvent::Disconnected(reason) => {
                // a win is followed by the server closing the socket
                if self.status == Status::Playing {
                    self.status = Status::Disconnected(reason);
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("Ignoring server update: {}", e);
        }
    }

    /// Collectible counts in seat order.
    pub fn scores(&self) -> Vec<(PlayerId, u8)> {
        self.board
            .players()
            .iter()
            .map(|p| (p.id, p.collected))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::encode_snapshot;
    use shared::Tile;

    const ME: PlayerId = PlayerId::ALL[0];

    /// 5x5 with an interior wall at (1, 2) and every cell revealed by the spawns.
    fn game() -> ClientGame {
        let mut tiles = vec![Tile::Wall; 25];
        for idx in [6, 8, 11, 12, 13, 16, 17, 18] {
            tiles[idx] = Tile::Floor;
        }
        tiles[6] = Tile::Player(PlayerId::ALL[0]);
        tiles[8] = Tile::Player(PlayerId::ALL[1]);
        tiles[16] = Tile::Player(PlayerId::ALL[2]);
        tiles[18] = Tile::Player(PlayerId::ALL[3]);
        tiles[12] = Tile::Collectible;
        let board = Board::from_snapshot(5, 5, &encode_snapshot(&tiles)).unwrap();
        ClientGame::new(board, ME)
    }

    #[test]
    fn test_visible_wall_is_not_sent() {
        let game = game();
        assert_eq!(game.target_for(Direction::Right), None);
        assert_eq!(game.target_for(Direction::Down), Some(Position::new(2, 1)));
        assert_eq!(game.target_for(Direction::Up), None);
    }

    #[test]
    fn test_server_move_clears_pending() {
        let mut game = game();
        game.mark_sent(Position::new(2, 1));
        game.apply(ServerEvent::PlayerMoved {
            player: ME,
            position: Position::new(2, 1),
        });
        assert_eq!(game.pending(), None);
        assert_eq!(game.board().player(ME).position, Position::new(2, 1));
    }

    #[test]
    fn test_collection_and_win() {
        let mut game = game();
        game.apply(ServerEvent::CollectibleTaken {
            player: PlayerId::ALL[3],
            position: Position::new(2, 2),
            collectible: Position::new(2, 3),
        });
        assert_eq!(game.board().collectible(), Some(Position::new(2, 3)));
        assert_eq!(game.scores()[3], (PlayerId::ALL[3], 1));

        game.apply(ServerEvent::GameWon {
            winner: PlayerId::ALL[3],
        });
        game.apply(ServerEvent::Disconnected("closed".into()));
        assert_eq!(game.status(), &Status::Won(PlayerId::ALL[3]));
        assert!(game.target_for(Direction::Down).is_none());
    }

    #[test]
    fn test_disconnect_during_play() {
        let mut game = game();
        game.apply(ServerEvent::Disconnected("reset".into()));
        assert_eq!(game.status(), &Status::Disconnected("reset".into()));
        assert!(game.is_over());
    }
}
