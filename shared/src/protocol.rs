//! Bit-packed wire format
//!
//! Every frame starts with a 3-bit token in the top bits of byte 0. Server
//! frames are 4 bytes; the move request a client sends is 3 bytes. Row and
//! column fields are 5 bits wide and player ids 2 bits.

use crate::error::ProtocolError;
use crate::types::{PlayerId, Position, Tile};

pub const TOKEN_MOVE: u8 = 0b010;
pub const TOKEN_COLLECTED: u8 = 0b011;
pub const TOKEN_WIN: u8 = 0b100;
pub const TOKEN_PING: u8 = 0b111;

pub const SERVER_FRAME_SIZE: usize = 4;
pub const CLIENT_FRAME_SIZE: usize = 3;

/// Largest value a 5-bit coordinate field holds.
pub const MAX_COORDINATE: usize = 0b1_1111;

const COORDINATE_BITS: u32 = 5;

/// A move request from a client. The target is absolute; the server decides
/// whether it is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerMove {
    pub player: PlayerId,
    pub target: Position,
}

impl PlayerMove {
    pub fn new(player: PlayerId, target: Position) -> Self {
        Self { player, target }
    }

    pub fn encode_request(&self) -> Result<[u8; CLIENT_FRAME_SIZE], ProtocolError> {
        let [b0, b1] = pack_move(TOKEN_MOVE, self.player, self.target)?;
        Ok([b0, b1, 0])
    }

    pub fn decode_request(frame: &[u8; CLIENT_FRAME_SIZE]) -> Result<Self, ProtocolError> {
        expect_token(frame[0], TOKEN_MOVE)?;
        let (player, target) = unpack_move(frame[0], frame[1]);
        Ok(Self { player, target })
    }
}

/// Everything the server sends after the handshake and the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFrame {
    /// Accepted move, or an unchanged-position echo of a blocked one.
    Move { player: PlayerId, position: Position },
    Collected {
        player: PlayerId,
        position: Position,
        collectible: Position,
    },
    Win { winner: PlayerId },
    Ping,
}

impl ServerFrame {
    pub fn token(&self) -> u8 {
        match self {
            ServerFrame::Move { .. } => TOKEN_MOVE,
            ServerFrame::Collected { .. } => TOKEN_COLLECTED,
            ServerFrame::Win { .. } => TOKEN_WIN,
            ServerFrame::Ping => TOKEN_PING,
        }
    }

    pub fn encode(&self) -> Result<[u8; SERVER_FRAME_SIZE], ProtocolError> {
        match *self {
            ServerFrame::Move { player, position } => {
                let [b0, b1] = pack_move(TOKEN_MOVE, player, position)?;
                Ok([b0, b1, 0, 0])
            }
            ServerFrame::Collected {
                player,
                position,
                collectible,
            } => {
                let [b0, mut b1] = pack_move(TOKEN_COLLECTED, player, position)?;
                let row = coordinate("collectible row", collectible.row)?;
                let col = coordinate("collectible col", collectible.col)?;
                b1 |= (row >> 4) & 0b1;
                let b2 = ((row & 0b1111) << 4) | ((col >> 1) & 0b1111);
                let b3 = (col & 0b1) << 7;
                Ok([b0, b1, b2, b3])
            }
            ServerFrame::Win { winner } => Ok([(TOKEN_WIN << 5) | (winner.get() << 3), 0, 0, 0]),
            ServerFrame::Ping => Ok([TOKEN_PING << 5, 0, 0, 0]),
        }
    }

    /// Dispatches on the token. Unknown tokens are a protocol error.
    pub fn decode(frame: &[u8; SERVER_FRAME_SIZE]) -> Result<Self, ProtocolError> {
        match token_of(frame[0]) {
            TOKEN_MOVE => decode_move(frame),
            TOKEN_COLLECTED => decode_collected(frame),
            TOKEN_WIN => decode_win(frame),
            TOKEN_PING => Ok(ServerFrame::Ping),
            other => Err(ProtocolError::UnknownToken(other)),
        }
    }
}

pub fn decode_move(frame: &[u8; SERVER_FRAME_SIZE]) -> Result<ServerFrame, ProtocolError> {
    expect_token(frame[0], TOKEN_MOVE)?;
    let (player, position) = unpack_move(frame[0], frame[1]);
    Ok(ServerFrame::Move { player, position })
}

pub fn decode_collected(frame: &[u8; SERVER_FRAME_SIZE]) -> Result<ServerFrame, ProtocolError> {
    expect_token(frame[0], TOKEN_COLLECTED)?;
    let (player, position) = unpack_move(frame[0], frame[1]);
    let row = ((frame[1] & 0b1) << 4) | (frame[2] >> 4);
    let col = ((frame[2] & 0b1111) << 1) | (frame[3] >> 7);
    Ok(ServerFrame::Collected {
        player,
        position,
        collectible: Position::new(usize::from(row), usize::from(col)),
    })
}

pub fn decode_win(frame: &[u8; SERVER_FRAME_SIZE]) -> Result<ServerFrame, ProtocolError> {
    expect_token(frame[0], TOKEN_WIN)?;
    Ok(ServerFrame::Win {
        winner: player_of(frame[0]),
    })
}

pub fn token_of(byte: u8) -> u8 {
    byte >> 5
}

fn expect_token(byte: u8, expected: u8) -> Result<(), ProtocolError> {
    let found = token_of(byte);
    if found == expected {
        Ok(())
    } else {
        Err(ProtocolError::InvalidToken { expected, found })
    }
}

fn coordinate(field: &'static str, value: usize) -> Result<u8, ProtocolError> {
    if value > MAX_COORDINATE {
        return Err(ProtocolError::FieldOutOfRange {
            field,
            value,
            bits: COORDINATE_BITS,
        });
    }
    Ok(value as u8)
}

fn pack_move(token: u8, player: PlayerId, position: Position) -> Result<[u8; 2], ProtocolError> {
    let row = coordinate("row", position.row)?;
    let col = coordinate("col", position.col)?;
    let b0 = (token << 5) | (player.get() << 3) | (row >> 2);
    let b1 = ((row & 0b11) << 6) | (col << 1);
    Ok([b0, b1])
}

fn player_of(b0: u8) -> PlayerId {
    // two bits always name a valid seat
    PlayerId::ALL[usize::from((b0 >> 3) & 0b11)]
}

fn unpack_move(b0: u8, b1: u8) -> (PlayerId, Position) {
    let row = ((b0 & 0b111) << 2) | (b1 >> 6);
    let col = (b1 >> 1) & 0b1_1111;
    (
        player_of(b0),
        Position::new(usize::from(row), usize::from(col)),
    )
}

/// Bytes in a maze snapshot of the given size: four bits per cell, rounded up.
pub fn snapshot_len(columns: usize, rows: usize) -> usize {
    (columns * rows * 4).div_ceil(8)
}

/// Packs tiles two per byte, first tile in the high nibble.
pub fn encode_snapshot(tiles: &[Tile]) -> Vec<u8> {
    tiles
        .chunks(2)
        .map(|pair| {
            let high = pair[0].code() << 4;
            let low = pair.get(1).map_or(0, |t| t.code());
            high | low
        })
        .collect()
}

pub fn decode_snapshot(
    bytes: &[u8],
    columns: usize,
    rows: usize,
) -> Result<Vec<Tile>, ProtocolError> {
    let expected = snapshot_len(columns, rows);
    if bytes.len() != expected {
        return Err(ProtocolError::SnapshotLength {
            expected,
            found: bytes.len(),
        });
    }
    bytes
        .iter()
        .flat_map(|b| [b >> 4, b & 0b1111])
        .take(columns * rows)
        .map(Tile::from_code)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> PlayerId {
        PlayerId::ALL[n]
    }

    #[test]
    fn test_move_frame_layout() {
        let frame = ServerFrame::Move {
            player: id(2),
            position: Position::new(0b10110, 0b01101),
        };
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes[0], 0b010_10_101);
        assert_eq!(bytes[1], 0b10_01101_0);
        assert_eq!(&bytes[2..], &[0, 0]);
        assert_eq!(ServerFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_collected_frame_layout() {
        let frame = ServerFrame::Collected {
            player: id(1),
            position: Position::new(3, 4),
            collectible: Position::new(0b10011, 0b11010),
        };
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes[0], 0b011_01_000);
        assert_eq!(bytes[1], 0b11_00100_1);
        assert_eq!(bytes[2], 0b0011_1101);
        assert_eq!(bytes[3], 0b0_0000000);
        assert_eq!(ServerFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_win_and_ping_frames() {
        let win = ServerFrame::Win { winner: id(3) };
        assert_eq!(win.encode().unwrap(), [0b100_11_000, 0, 0, 0]);
        assert_eq!(ServerFrame::decode(&[0b100_11_000, 0, 0, 0]).unwrap(), win);

        assert_eq!(ServerFrame::Ping.encode().unwrap(), [0xE0, 0, 0, 0]);
        assert_eq!(ServerFrame::decode(&[0xE0, 0, 0, 0]).unwrap(), ServerFrame::Ping);
    }

    #[test]
    fn test_every_field_value_survives() {
        for n in 0..4 {
            for row in 0..=MAX_COORDINATE {
                for col in 0..=MAX_COORDINATE {
                    let position = Position::new(row, col);

                    let moved = ServerFrame::Move {
                        player: id(n),
                        position,
                    };
                    assert_eq!(ServerFrame::decode(&moved.encode().unwrap()).unwrap(), moved);

                    let collected = ServerFrame::Collected {
                        player: id(n),
                        position,
                        collectible: Position::new(col, MAX_COORDINATE - row),
                    };
                    assert_eq!(
                        ServerFrame::decode(&collected.encode().unwrap()).unwrap(),
                        collected
                    );

                    let request = PlayerMove::new(id(n), position);
                    let bytes = request.encode_request().unwrap();
                    assert_eq!(bytes[2], 0);
                    assert_eq!(PlayerMove::decode_request(&bytes).unwrap(), request);
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_coordinate() {
        let frame = ServerFrame::Move {
            player: id(0),
            position: Position::new(32, 0),
        };
        assert_eq!(
            frame.encode(),
            Err(ProtocolError::FieldOutOfRange {
                field: "row",
                value: 32,
                bits: 5
            })
        );
    }

    #[test]
    fn test_wrong_token_is_rejected() {
        let ping = ServerFrame::Ping.encode().unwrap();
        assert_eq!(
            decode_move(&ping),
            Err(ProtocolError::InvalidToken {
                expected: TOKEN_MOVE,
                found: TOKEN_PING
            })
        );
        assert_eq!(
            PlayerMove::decode_request(&[0b011_00_000, 0, 0]),
            Err(ProtocolError::InvalidToken {
                expected: TOKEN_MOVE,
                found: TOKEN_COLLECTED
            })
        );
        assert_eq!(
            ServerFrame::decode(&[0b101_00_000, 0, 0, 0]),
            Err(ProtocolError::UnknownToken(0b101))
        );
    }

    #[test]
    fn test_request_is_three_bytes_with_zero_pad() {
        let request = PlayerMove::new(id(1), Position::new(5, 9));
        let bytes = request.encode_request().unwrap();
        assert_eq!(bytes.len(), CLIENT_FRAME_SIZE);
        assert_eq!(bytes[2], 0);
        assert_eq!(token_of(bytes[0]), TOKEN_MOVE);
    }

    #[test]
    fn test_snapshot_packing() {
        let mut tiles = vec![Tile::Wall; 16];
        tiles[5] = Tile::Floor;
        let bytes = encode_snapshot(&tiles);

        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[0] >> 4, 0b0000);
        assert_eq!(bytes[0] & 0b1111, 0b0000);
        assert_eq!(bytes[2] >> 4, 0b0000);
        assert_eq!(bytes[2] & 0b1111, 0b0001);
        assert!(bytes.iter().enumerate().all(|(i, b)| i == 2 || *b == 0));
    }

    #[test]
    fn test_snapshot_odd_cell_count() {
        assert_eq!(snapshot_len(5, 5), 13);
        let mut tiles = vec![Tile::Floor; 25];
        tiles[24] = Tile::Player(id(3));
        let bytes = encode_snapshot(&tiles);
        assert_eq!(bytes.len(), 13);
        assert_eq!(bytes[12], 0b1010_0000);
        assert_eq!(decode_snapshot(&bytes, 5, 5).unwrap(), tiles);
    }

    #[test]
    fn test_snapshot_length_mismatch() {
        assert_eq!(
            decode_snapshot(&[0; 7], 4, 4),
            Err(ProtocolError::SnapshotLength {
                expected: 8,
                found: 7
            })
        );
    }

    #[test]
    fn test_decorated_floor_in_snapshot() {
        let decoded = decode_snapshot(&[0x23, 0x45, 0x16, 0x78], 2, 4).unwrap();
        assert_eq!(&decoded[..4], &[Tile::Floor; 4]);
        assert_eq!(decoded[4], Tile::Floor);
        assert_eq!(decoded[5], Tile::Collectible);
        assert_eq!(decoded[6], Tile::Player(id(0)));
        assert_eq!(decoded[7], Tile::Player(id(1)));
    }
}
