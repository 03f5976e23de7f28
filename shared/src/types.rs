use crate::error::{GameError, ProtocolError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of seats in every match.
pub const PLAYER_COUNT: usize = 4;

/// A cell coordinate, row first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// The neighbouring cell in `direction`, or `None` when it would leave the
    /// non-negative quadrant. Callers still check the upper grid bounds.
    pub fn step(self, direction: Direction) -> Option<Position> {
        let (dr, dc) = direction.offset();
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        Some(Position { row, col })
    }

    /// True when `other` is one orthogonal step away.
    pub fn is_adjacent(self, other: Position) -> bool {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col) == 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Seat number 0..=3, stable for the whole match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u8);

impl PlayerId {
    pub const ALL: [PlayerId; PLAYER_COUNT] = [PlayerId(0), PlayerId(1), PlayerId(2), PlayerId(3)];

    pub fn new(id: u8) -> Option<Self> {
        (usize::from(id) < PLAYER_COUNT).then_some(PlayerId(id))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PlayerId {
    type Error = GameError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        PlayerId::new(id).ok_or(GameError::InvalidPlayerId(id))
    }
}

impl From<PlayerId> for u8 {
    fn from(id: PlayerId) -> u8 {
        id.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directional intent coming from the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// (row delta, column delta)
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

/// What occupies a cell, as seen by the snapshot encoder and the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tile {
    Wall,
    Floor,
    Collectible,
    Player(PlayerId),
}

impl Tile {
    const WALL: u8 = 0b0000;
    const FLOOR: u8 = 0b0001;
    const DECORATED_FLOOR_LAST: u8 = 0b0101;
    const COLLECTIBLE: u8 = 0b0110;
    const PLAYER_BASE: u8 = 0b0111;

    /// 4-bit snapshot code.
    pub fn code(self) -> u8 {
        match self {
            Tile::Wall => Self::WALL,
            Tile::Floor => Self::FLOOR,
            Tile::Collectible => Self::COLLECTIBLE,
            Tile::Player(id) => Self::PLAYER_BASE + id.get(),
        }
    }

    /// Decorated floors (`0010`..`0101`) decode as plain floor.
    pub fn from_code(code: u8) -> Result<Tile, ProtocolError> {
        match code {
            Self::WALL => Ok(Tile::Wall),
            Self::FLOOR..=Self::DECORATED_FLOOR_LAST => Ok(Tile::Floor),
            Self::COLLECTIBLE => Ok(Tile::Collectible),
            c if (Self::PLAYER_BASE..Self::PLAYER_BASE + PLAYER_COUNT as u8).contains(&c) => {
                Ok(Tile::Player(PlayerId(c - Self::PLAYER_BASE)))
            }
            c => Err(ProtocolError::InvalidTileCode(c)),
        }
    }

    pub fn is_passable(self) -> bool {
        !matches!(self, Tile::Wall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_range() {
        assert_eq!(PlayerId::new(3).map(PlayerId::index), Some(3));
        assert!(PlayerId::new(4).is_none());
        assert_eq!(PlayerId::try_from(7), Err(GameError::InvalidPlayerId(7)));
    }

    #[test]
    fn test_position_step() {
        let origin = Position::new(0, 0);
        assert_eq!(origin.step(Direction::Up), None);
        assert_eq!(origin.step(Direction::Left), None);
        assert_eq!(origin.step(Direction::Down), Some(Position::new(1, 0)));
        assert_eq!(origin.step(Direction::Right), Some(Position::new(0, 1)));
    }

    #[test]
    fn test_adjacency() {
        let pos = Position::new(3, 3);
        assert!(pos.is_adjacent(Position::new(2, 3)));
        assert!(pos.is_adjacent(Position::new(3, 4)));
        assert!(!pos.is_adjacent(Position::new(4, 4)));
        assert!(!pos.is_adjacent(pos));
    }

    #[test]
    fn test_tile_codes() {
        assert_eq!(Tile::Wall.code(), 0b0000);
        assert_eq!(Tile::Floor.code(), 0b0001);
        assert_eq!(Tile::Collectible.code(), 0b0110);
        assert_eq!(Tile::Player(PlayerId::ALL[0]).code(), 0b0111);
        assert_eq!(Tile::Player(PlayerId::ALL[3]).code(), 0b1010);
    }

    #[test]
    fn test_decorated_floor_decodes_as_floor() {
        for code in 0b0010..=0b0101 {
            assert_eq!(Tile::from_code(code), Ok(Tile::Floor));
        }
        assert_eq!(
            Tile::from_code(0b1000),
            Ok(Tile::Player(PlayerId::ALL[1]))
        );
        assert_eq!(
            Tile::from_code(0b1011),
            Err(ProtocolError::InvalidTileCode(0b1011))
        );
    }
}
