//! Keyboard sampling with repeat limiting

use macroquad::prelude::*;
use shared::Direction;
use std::time::{Duration, Instant};

/// Minimum time between two moves while a key is held down
pub const REPEAT_DELAY: Duration = Duration::from_millis(120);

/// Maps a key to a move direction (WASD and arrow keys)
pub fn direction_for_key(key: KeyCode) -> Option<Direction> {
    match key {
        KeyCode::W | KeyCode::Up => Some(Direction::Up),
        KeyCode::S | KeyCode::Down => Some(Direction::Down),
        KeyCode::A | KeyCode::Left => Some(Direction::Left),
        KeyCode::D | KeyCode::Right => Some(Direction::Right),
        _ => None,
    }
}

const MOVE_KEYS: [KeyCode; 8] = [
    KeyCode::W,
    KeyCode::Up,
    KeyCode::S,
    KeyCode::Down,
    KeyCode::A,
    KeyCode::Left,
    KeyCode::D,
    KeyCode::Right,
];

/// Turns held keys into at most one direction per `REPEAT_DELAY`
pub struct InputManager {
    last_move: Option<Instant>,
}

impl InputManager {
    pub fn new() -> Self {
        Self { last_move: None }
    }

    /// Samples the keyboard once per frame.
    pub fn update(&mut self) -> Option<Direction> {
        let direction = MOVE_KEYS
            .iter()
            .copied()
            .find(|key| is_key_down(*key))
            .and_then(direction_for_key)?;
        self.throttle(direction, Instant::now())
    }

    fn throttle(&mut self, direction: Direction, now: Instant) -> Option<Direction> {
        match self.last_move {
            Some(last) if now.duration_since(last) < REPEAT_DELAY => None,
            _ => {
                self.last_move = Some(now);
                Some(direction)
            }
        }
    }

    /// True when the user asked to leave.
    pub fn quit_requested(&self) -> bool {
        is_key_pressed(KeyCode::Escape)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
