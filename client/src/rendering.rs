use crate::game::{ClientGame, Status};
use macroquad::prelude::*;
use shared::{PlayerId, Position, Tile};

/// Seat colours, indexed by player id
const PLAYER_COLORS: [Color; 4] = [
    Color::new(0.27, 0.87, 0.40, 1.0),
    Color::new(1.0, 0.27, 0.27, 1.0),
    Color::new(0.0, 0.67, 1.0, 1.0),
    Color::new(1.0, 0.84, 0.0, 1.0),
];

const HUD_HEIGHT: f32 = 40.0;

pub fn player_color(id: PlayerId) -> Color {
    PLAYER_COLORS[id.index()]
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    /// Side of one square cell so the whole grid fits under the HUD.
    fn cell_size(&self, columns: usize, rows: usize) -> f32 {
        let by_width = self.width / columns as f32;
        let by_height = (self.height - HUD_HEIGHT) / rows as f32;
        by_width.min(by_height).floor().max(1.0)
    }

    pub fn render(&self, game: &ClientGame) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        let board = game.board();
        let grid = board.grid();
        let size = self.cell_size(board.columns(), board.rows());

        for pos in grid.positions() {
            let x = pos.col as f32 * size;
            let y = HUD_HEIGHT + pos.row as f32 * size;

            // own position is always drawn, everything else needs line of sight
            let tile = board.tile_at(pos);
            let mine = tile == Tile::Player(game.me());
            if !grid.is_visible(pos) && !mine {
                draw_rectangle(x, y, size, size, Color::from_rgba(10, 10, 10, 255));
                continue;
            }
            self.draw_tile(tile, x, y, size);
            if mine {
                draw_rectangle_lines(x, y, size, size, 2.0, WHITE);
            }
        }

        if let Some(pending) = game.pending() {
            self.draw_pending(pending, size);
        }
        self.draw_hud(game);
    }

    fn draw_tile(&self, tile: Tile, x: f32, y: f32, size: f32) {
        match tile {
            Tile::Wall => draw_rectangle(x, y, size, size, Color::from_rgba(68, 68, 68, 255)),
            Tile::Floor => draw_rectangle(x, y, size, size, Color::from_rgba(200, 190, 160, 255)),
            Tile::Collectible => {
                draw_rectangle(x, y, size, size, Color::from_rgba(200, 190, 160, 255));
                draw_circle(x + size / 2.0, y + size / 2.0, size / 3.0, ORANGE);
            }
            Tile::Player(id) => {
                draw_rectangle(x, y, size, size, Color::from_rgba(200, 190, 160, 255));
                draw_rectangle(
                    x + size * 0.15,
                    y + size * 0.15,
                    size * 0.7,
                    size * 0.7,
                    player_color(id),
                );
            }
        }
    }

    fn draw_pending(&self, target: Position, size: f32) {
        let x = target.col as f32 * size;
        let y = HUD_HEIGHT + target.row as f32 * size;
        draw_rectangle_lines(x, y, size, size, 1.0, YELLOW);
    }

    fn draw_hud(&self, game: &ClientGame) {
        let mut x = 10.0;
        for (id, collected) in game.scores() {
            draw_rectangle(x, 12.0, 12.0, 12.0, player_color(id));
            let label = if id == game.me() {
                format!("P{} (you): {}", id, collected)
            } else {
                format!("P{}: {}", id, collected)
            };
            draw_text(&label, x + 16.0, 23.0, 18.0, WHITE);
            x += 110.0;
        }

        let message = match game.status() {
            Status::Playing => return,
            Status::Won(winner) if *winner == game.me() => "You won!".to_string(),
            Status::Won(winner) => format!("Player {} won", winner),
            Status::Disconnected(reason) => format!("Disconnected: {}", reason),
        };
        let dims = measure_text(&message, None, 32, 1.0);
        draw_text(
            &message,
            (self.width - dims.width) / 2.0,
            self.height / 2.0,
            32.0,
            WHITE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_size_fits_grid() {
        let renderer = Renderer::new(800, 640);
        assert_eq!(renderer.cell_size(20, 20), 30.0);
        assert_eq!(renderer.cell_size(32, 10), 25.0);
    }

    #[test]
    fn test_players_have_distinct_colors() {
        for a in PlayerId::ALL {
            for b in PlayerId::ALL {
                if a != b {
                    assert_ne!(player_color(a), player_color(b));
                }
            }
        }
    }
}
