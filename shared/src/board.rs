//! Authoritative match state: grid, four player slots and the collectible
//!
//! The server mutates a `Board` only through [`Board::attempt_move`], which
//! validates a move, applies it and re-places the collectible in one call so
//! the whole transition happens under a single lock acquisition. Clients build
//! their board from the maze snapshot and apply server frames without
//! validation through [`Board::apply_remote_move`] and
//! [`Board::apply_collection`].

use crate::error::{GameError, GameResult};
use crate::maze::{Grid, MazeBuilder, MIN_DIMENSION};
use crate::protocol::{self, MAX_COORDINATE};
use crate::types::{PlayerId, Position, Tile, PLAYER_COUNT};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Collectibles needed to win.
pub const WIN_THRESHOLD: u8 = 3;

/// Largest grid side that the 5-bit coordinate fields can address.
pub const MAX_DIMENSION: usize = MAX_COORDINATE + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub position: Position,
    pub collected: u8,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Setup,
    Active,
    Terminal { winner: PlayerId },
}

/// Result of validating a move. `Blocked` covers both walls and collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveOutcome {
    Accepted,
    Blocked,
    Collected { collectible: Position },
    Won,
}

#[derive(Debug, Clone)]
pub struct Board {
    grid: Grid,
    players: [PlayerState; PLAYER_COUNT],
    collectible: Option<Position>,
    phase: MatchPhase,
    rng: StdRng,
}

impl Board {
    /// Generates a fresh maze and seats the four players in its corners.
    pub fn initialize(columns: usize, rows: usize) -> GameResult<Self> {
        Self::initialize_with_rng(columns, rows, StdRng::from_entropy())
    }

    /// Deterministic variant of [`Board::initialize`].
    pub fn initialize_with_seed(columns: usize, rows: usize, seed: u64) -> GameResult<Self> {
        Self::initialize_with_rng(columns, rows, StdRng::seed_from_u64(seed))
    }

    fn initialize_with_rng(columns: usize, rows: usize, mut rng: StdRng) -> GameResult<Self> {
        check_match_dimensions(columns, rows)?;
        let builder = MazeBuilder::new(columns, rows)?.with_open_corners();
        let grid = builder.build(&mut rng);
        let mut board = Self::seat_players(grid, builder.interior_corners(), rng);
        board.reveal_border();
        for id in PlayerId::ALL {
            board.reveal_around(board.players[id.index()].position);
        }
        info!("Initialized {}x{} board", columns, rows);
        Ok(board)
    }

    /// Seats players on a prepared grid. Every spawn must be an in-bounds floor cell and distinct.
    pub fn with_grid(grid: Grid, spawns: [Position; PLAYER_COUNT], seed: u64) -> GameResult<Self> {
        check_dimensions(grid.columns(), grid.rows())?;
        for (i, spawn) in spawns.iter().enumerate() {
            if !grid.contains(*spawn) {
                return Err(GameError::OutOfBounds {
                    row: spawn.row,
                    col: spawn.col,
                });
            }
            if !grid.is_passable(*spawn) || spawns[..i].contains(spawn) {
                return Err(GameError::InvalidSnapshot(format!(
                    "spawn {} is not a free floor cell",
                    spawn
                )));
            }
        }
        Ok(Self::seat_players(grid, spawns, StdRng::seed_from_u64(seed)))
    }

    fn seat_players(grid: Grid, spawns: [Position; PLAYER_COUNT], rng: StdRng) -> Self {
        let players = PlayerId::ALL.map(|id| PlayerState {
            id,
            position: spawns[id.index()],
            collected: 0,
            connected: false,
        });
        Self {
            grid,
            players,
            collectible: None,
            phase: MatchPhase::Setup,
            rng,
        }
    }

    /// Rebuilds the client-side view from a maze snapshot frame.
    pub fn from_snapshot(columns: usize, rows: usize, snapshot: &[u8]) -> GameResult<Self> {
        check_dimensions(columns, rows)?;
        let tiles = protocol::decode_snapshot(snapshot, columns, rows)
            .map_err(|e| GameError::InvalidSnapshot(e.to_string()))?;

        let mut grid = Grid::filled_with_walls(columns, rows);
        let mut spawns: [Option<Position>; PLAYER_COUNT] = [None; PLAYER_COUNT];
        let mut collectible = None;

        for (pos, tile) in grid.positions().collect::<Vec<_>>().into_iter().zip(tiles) {
            grid.set_passable(pos, tile.is_passable());
            match tile {
                Tile::Player(id) => {
                    if spawns[id.index()].replace(pos).is_some() {
                        return Err(GameError::InvalidSnapshot(format!(
                            "player {} appears twice",
                            id
                        )));
                    }
                }
                Tile::Collectible => {
                    if collectible.replace(pos).is_some() {
                        return Err(GameError::InvalidSnapshot(
                            "more than one collectible".to_string(),
                        ));
                    }
                }
                Tile::Wall | Tile::Floor => {}
            }
        }

        let mut positions = [Position::new(0, 0); PLAYER_COUNT];
        for id in PlayerId::ALL {
            positions[id.index()] = spawns[id.index()].ok_or_else(|| {
                GameError::InvalidSnapshot(format!("player {} is missing", id))
            })?;
        }
        let collectible = collectible
            .ok_or_else(|| GameError::InvalidSnapshot("collectible is missing".to_string()))?;

        let mut board = Self::seat_players(grid, positions, StdRng::from_entropy());
        for player in board.players.iter_mut() {
            player.connected = true;
        }
        board.collectible = Some(collectible);
        board.phase = MatchPhase::Active;
        board.reveal_border();
        for pos in positions {
            board.reveal_around(pos);
        }
        Ok(board)
    }

    pub fn columns(&self) -> usize {
        self.grid.columns()
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    /// The maze itself, including which cells have been revealed.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// The winning player once the match is terminal.
    pub fn winner(&self) -> Option<PlayerId> {
        match self.phase {
            MatchPhase::Terminal { winner } => Some(winner),
            _ => None,
        }
    }

    pub fn player(&self, id: PlayerId) -> &PlayerState {
        &self.players[id.index()]
    }

    pub fn players(&self) -> &[PlayerState; PLAYER_COUNT] {
        &self.players
    }

    pub fn collectible(&self) -> Option<Position> {
        self.collectible
    }

    /// The player standing on `pos`, if any.
    pub fn occupant(&self, pos: Position) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|p| p.position == pos)
            .map(|p| p.id)
    }

    /// Tracks liveness only; a disconnected player keeps its cell.
    pub fn set_connected(&mut self, id: PlayerId, connected: bool) {
        self.players[id.index()].connected = connected;
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.connected).count()
    }

    /// Moves the match from `Setup` to `Active` and drops the first collectible.
    pub fn start(&mut self) -> GameResult<Position> {
        if self.phase != MatchPhase::Setup {
            return Err(GameError::MatchNotActive);
        }
        let pos = self.place_collectible_randomly()?;
        self.phase = MatchPhase::Active;
        Ok(pos)
    }

    /// Samples random floor cells until one is free of players.
    ///
    /// Fails with [`GameError::NoFreeCell`] instead of spinning when no such cell exists.
    pub fn place_collectible_randomly(&mut self) -> GameResult<Position> {
        let floor: Vec<Position> = self
            .grid
            .positions()
            .filter(|p| self.grid.is_passable(*p))
            .collect();
        if !floor.iter().any(|p| self.occupant(*p).is_none()) {
            return Err(GameError::NoFreeCell);
        }

        loop {
            let candidate = floor[self.rng.gen_range(0..floor.len())];
            if self.occupant(candidate).is_none() {
                self.collectible = Some(candidate);
                debug!("Collectible placed at {}", candidate);
                return Ok(candidate);
            }
        }
    }

    /// Puts the collectible on a specific free floor cell.
    pub fn place_collectible_at(&mut self, pos: Position) -> GameResult<()> {
        self.check_bounds(pos)?;
        if !self.grid.is_passable(pos) || self.occupant(pos).is_some() {
            return Err(GameError::NoFreeCell);
        }
        self.collectible = Some(pos);
        Ok(())
    }

    /// Validates and applies one move.
    ///
    /// Decision order: another player on the target blocks; then the
    /// collectible is taken (winning at [`WIN_THRESHOLD`]); then walls block;
    /// anything else is accepted. Blocked moves leave the board untouched.
    pub fn attempt_move(&mut self, id: PlayerId, target: Position) -> GameResult<MoveOutcome> {
        if self.phase != MatchPhase::Active {
            return Err(GameError::MatchNotActive);
        }
        self.check_bounds(target)?;

        if self.occupant(target).is_some_and(|other| other != id) {
            return Ok(MoveOutcome::Blocked);
        }

        if self.collectible == Some(target) {
            // the collectible must avoid the target but may reuse the vacated cell
            let from = self.players[id.index()].position;
            self.players[id.index()].position = target;
            let collectible = match self.place_collectible_randomly() {
                Ok(pos) => pos,
                Err(e) => {
                    self.players[id.index()].position = from;
                    return Err(e);
                }
            };
            self.reveal_around(target);
            let player = &mut self.players[id.index()];
            player.collected += 1;
            let collected = player.collected;

            if collected >= WIN_THRESHOLD {
                self.phase = MatchPhase::Terminal { winner: id };
                info!("Player {} won with {} collectibles", id, collected);
                return Ok(MoveOutcome::Won);
            }
            debug!("Player {} collected #{}", id, collected);
            return Ok(MoveOutcome::Collected { collectible });
        }

        if !self.grid.is_passable(target) {
            return Ok(MoveOutcome::Blocked);
        }

        self.relocate(id, target);
        Ok(MoveOutcome::Accepted)
    }

    fn relocate(&mut self, id: PlayerId, target: Position) {
        self.players[id.index()].position = target;
        self.reveal_around(target);
    }

    /// Applies a move the server already accepted.
    pub fn apply_remote_move(&mut self, id: PlayerId, target: Position) -> GameResult<()> {
        self.check_bounds(target)?;
        self.relocate(id, target);
        Ok(())
    }

    /// Applies a collection the server already accepted.
    pub fn apply_collection(
        &mut self,
        id: PlayerId,
        target: Position,
        collectible: Position,
    ) -> GameResult<()> {
        self.check_bounds(target)?;
        self.check_bounds(collectible)?;
        self.relocate(id, target);
        let player = &mut self.players[id.index()];
        player.collected = player.collected.saturating_add(1);
        self.collectible = Some(collectible);
        Ok(())
    }

    /// Records a win announced by the server.
    pub fn apply_win(&mut self, winner: PlayerId) {
        self.phase = MatchPhase::Terminal { winner };
    }

    /// Marks the eight cells around `center` visible.
    pub fn reveal_around(&mut self, center: Position) {
        for dr in -1isize..=1 {
            for dc in -1isize..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                if let (Some(row), Some(col)) = (
                    center.row.checked_add_signed(dr),
                    center.col.checked_add_signed(dc),
                ) {
                    self.grid.reveal(Position::new(row, col));
                }
            }
        }
    }

    /// Marks every border cell visible. The outline of the maze is known from the start.
    pub fn reveal_border(&mut self) {
        let border: Vec<Position> = self
            .grid
            .positions()
            .filter(|p| self.grid.is_border(*p))
            .collect();
        for pos in border {
            self.grid.reveal(pos);
        }
    }

    /// Lifts the fog of war entirely, used once the match is decided.
    pub fn reveal_all(&mut self) {
        let all: Vec<Position> = self.grid.positions().collect();
        for pos in all {
            self.grid.reveal(pos);
        }
    }

    /// What a cell shows: a player, then the collectible, then floor or wall.
    pub fn tile_at(&self, pos: Position) -> Tile {
        if let Some(id) = self.occupant(pos) {
            Tile::Player(id)
        } else if self.collectible == Some(pos) {
            Tile::Collectible
        } else if self.grid.is_passable(pos) {
            Tile::Floor
        } else {
            Tile::Wall
        }
    }

    /// Tiles in row-major order, the same order the snapshot frame uses.
    pub fn tiles(&self) -> Vec<Tile> {
        self.grid.positions().map(|p| self.tile_at(p)).collect()
    }

    /// Encodes the full board as the maze snapshot frame.
    ///
    /// Visibility is not part of the frame; the client derives its own fog
    /// of war from the border and the spawn surroundings.
    pub fn snapshot(&self) -> Vec<u8> {
        protocol::encode_snapshot(&self.tiles())
    }

    fn check_bounds(&self, pos: Position) -> GameResult<()> {
        if self.grid.contains(pos) {
            Ok(())
        } else {
            Err(GameError::OutOfBounds {
                row: pos.row,
                col: pos.col,
            })
        }
    }
}

/// Checks that a grid can host a whole match.
///
/// Besides the wire limits, the interior must hold more cells than there are
/// players, otherwise the collectible has nowhere to go once everyone is seated.
pub fn check_match_dimensions(columns: usize, rows: usize) -> GameResult<()> {
    check_dimensions(columns, rows)?;
    if (columns - 2) * (rows - 2) <= PLAYER_COUNT {
        return Err(GameError::NoRoomForCollectible { columns, rows });
    }
    Ok(())
}

fn check_dimensions(columns: usize, rows: usize) -> GameResult<()> {
    if columns < MIN_DIMENSION || rows < MIN_DIMENSION {
        return Err(GameError::GridTooSmall {
            columns,
            rows,
            min: MIN_DIMENSION,
        });
    }
    if columns > MAX_DIMENSION || rows > MAX_DIMENSION {
        return Err(GameError::GridTooLarge {
            columns,
            rows,
            max: MAX_DIMENSION,
        });
    }
    Ok(())
}
