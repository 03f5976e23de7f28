//! Grid storage and procedural maze generation
//!
//! Floor cells are carved on a lattice of odd coordinates spaced two apart, so
//! every pair of neighbouring lattice cells has exactly one wall cell between
//! them. A randomized depth-first traversal over that lattice yields a spanning
//! tree (connected, acyclic). A second pass then knocks out a share of the
//! remaining interior walls to add cycles, but only where doing so cannot open
//! a 2x2 floor block or strand a floor cell.
//!
//! Lattice parity: the traversal corners are `(1, 1)`, `(1, Lc)`, `(Lr, 1)` and
//! `(Lr, Lc)` where `Lc` and `Lr` are the largest odd coordinates that are still
//! inside the border (`<= columns - 2` and `<= rows - 2`). With even dimensions
//! the last interior row/column is off the lattice and stays wall apart from
//! cells opened by the cycle pass.

use crate::error::{GameError, GameResult};
use crate::types::{Direction, Position};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Smallest accepted width or height.
pub const MIN_DIMENSION: usize = 4;

/// Share of interior cells turned from wall to floor by the cycle pass.
pub const WALL_REMOVAL_RATIO: f64 = 0.12;

/// Distance between neighbouring lattice cells.
const LATTICE_STEP: usize = 2;

/// One grid position. Walls start invisible; visibility never reverts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub passable: bool,
    pub visible: bool,
}

/// Row-major rectangular cell array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    columns: usize,
    rows: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// A grid made entirely of invisible walls.
    pub fn filled_with_walls(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            cells: vec![Cell::default(); columns * rows],
        }
    }

    /// Parses `#` as wall and anything else as floor, one string per row.
    pub fn from_ascii(rows: &[&str]) -> GameResult<Self> {
        let row_count = rows.len();
        let columns = rows.first().map_or(0, |r| r.chars().count());
        if columns < MIN_DIMENSION || row_count < MIN_DIMENSION {
            return Err(GameError::GridTooSmall {
                columns,
                rows: row_count,
                min: MIN_DIMENSION,
            });
        }

        let mut grid = Grid::filled_with_walls(columns, row_count);
        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() != columns {
                return Err(GameError::InvalidSnapshot(format!(
                    "row {} has {} cells, expected {}",
                    row,
                    line.chars().count(),
                    columns
                )));
            }
            for (col, ch) in line.chars().enumerate() {
                grid.set_passable(Position::new(row, col), ch != '#');
            }
        }
        Ok(grid)
    }

    /// Width of the grid, border included.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Height of the grid, border included.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// True when `pos` lies inside the grid, border included.
    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.columns
    }

    fn index(&self, pos: Position) -> usize {
        pos.row * self.columns + pos.col
    }

    /// The cell at `pos`, or `None` outside the grid.
    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        self.contains(pos).then(|| &self.cells[self.index(pos)])
    }

    /// Out-of-bounds positions count as walls.
    pub fn is_passable(&self, pos: Position) -> bool {
        self.cell(pos).is_some_and(|c| c.passable)
    }

    pub fn is_visible(&self, pos: Position) -> bool {
        self.cell(pos).is_some_and(|c| c.visible)
    }

    pub fn set_passable(&mut self, pos: Position, passable: bool) {
        if self.contains(pos) {
            let idx = self.index(pos);
            self.cells[idx].passable = passable;
        }
    }

    /// Marks a cell as seen. Visibility never reverts; out-of-bounds positions are ignored.
    pub fn reveal(&mut self, pos: Position) {
        if self.contains(pos) {
            let idx = self.index(pos);
            self.cells[idx].visible = true;
        }
    }

    /// Outermost ring of cells, always wall in a generated maze.
    pub fn is_border(&self, pos: Position) -> bool {
        pos.row == 0 || pos.col == 0 || pos.row + 1 == self.rows || pos.col + 1 == self.columns
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.columns).map(move |col| Position::new(row, col)))
    }

    pub fn passable_count(&self) -> usize {
        self.cells.iter().filter(|c| c.passable).count()
    }

    /// In-bounds orthogonal neighbours.
    pub fn neighbours(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |d| pos.step(d))
            .filter(move |p| self.contains(*p))
    }

    /// Number of floor cells reachable from `start` through orthogonal floor steps.
    pub fn reachable_from(&self, start: Position) -> usize {
        if !self.is_passable(start) {
            return 0;
        }
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(pos) = queue.pop_front() {
            for next in self.neighbours(pos) {
                if self.is_passable(next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen.len()
    }

    /// True when every floor cell can reach every other one.
    pub fn is_connected(&self) -> bool {
        match self.positions().find(|p| self.is_passable(*p)) {
            Some(start) => self.reachable_from(start) == self.passable_count(),
            None => true,
        }
    }

    /// Top-left corners of interior 2x2 windows that are all floor or all wall.
    pub fn degenerate_blocks(&self) -> Vec<Position> {
        let mut found = Vec::new();
        for row in 1..self.rows.saturating_sub(2) {
            for col in 1..self.columns.saturating_sub(2) {
                let window = [
                    Position::new(row, col),
                    Position::new(row, col + 1),
                    Position::new(row + 1, col),
                    Position::new(row + 1, col + 1),
                ];
                let open = window.iter().filter(|p| self.is_passable(**p)).count();
                if open == 0 || open == window.len() {
                    found.push(window[0]);
                }
            }
        }
        found
    }
}

/// Counters reported by [`MazeBuilder::build_with_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarveStats {
    pub lattice_cells: usize,
    pub removal_target: usize,
    pub walls_removed: usize,
}

/// Randomized depth-first maze generator with cycle injection.
#[derive(Debug, Clone)]
pub struct MazeBuilder {
    columns: usize,
    rows: usize,
    removal_ratio: f64,
    open_corners: bool,
}

impl MazeBuilder {
    /// Fails with [`GameError::GridTooSmall`] below [`MIN_DIMENSION`] on either side.
    pub fn new(columns: usize, rows: usize) -> GameResult<Self> {
        if columns < MIN_DIMENSION || rows < MIN_DIMENSION {
            return Err(GameError::GridTooSmall {
                columns,
                rows,
                min: MIN_DIMENSION,
            });
        }
        Ok(Self {
            columns,
            rows,
            removal_ratio: WALL_REMOVAL_RATIO,
            open_corners: false,
        })
    }

    /// Overrides the share of interior walls removed after carving. `0.0` keeps a perfect maze.
    pub fn with_removal_ratio(mut self, ratio: f64) -> Self {
        self.removal_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Keeps the four interior corners open and linked to the maze.
    ///
    /// They are opened right after carving, so the cycle pass sees them and
    /// the no-2x2 guarantee still holds for the finished grid.
    pub fn with_open_corners(mut self) -> Self {
        self.open_corners = true;
        self
    }

    /// Largest odd coordinate strictly inside the border.
    fn last_lattice(extent: usize) -> usize {
        let inner = extent - 2;
        if inner % 2 == 1 {
            inner
        } else {
            inner - 1
        }
    }

    /// The four traversal corners, clockwise from the top-left. They coincide on tiny grids.
    pub fn lattice_corners(&self) -> [Position; 4] {
        let last_row = Self::last_lattice(self.rows);
        let last_col = Self::last_lattice(self.columns);
        [
            Position::new(1, 1),
            Position::new(1, last_col),
            Position::new(last_row, last_col),
            Position::new(last_row, 1),
        ]
    }

    /// Cells just inside the border corners: top-left, top-right, bottom-left, bottom-right.
    ///
    /// With an even dimension these sit one step off the lattice.
    pub fn interior_corners(&self) -> [Position; 4] {
        [
            Position::new(1, 1),
            Position::new(1, self.columns - 2),
            Position::new(self.rows - 2, 1),
            Position::new(self.rows - 2, self.columns - 2),
        ]
    }

    /// Number of walls the cycle pass aims to remove.
    pub fn removal_target(&self) -> usize {
        let interior = (self.columns - 2) * (self.rows - 2);
        (interior as f64 * self.removal_ratio) as usize
    }

    /// Generates one maze. See [`MazeBuilder::build_with_stats`] for the steps.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Grid {
        self.build_with_stats(rng).0
    }

    /// Generates one maze and reports what the passes did.
    ///
    /// 1. Carve a spanning tree over the odd-coordinate lattice with a randomized
    ///    depth-first walk starting at (1, 1).
    /// 2. Open the interior corners when requested.
    /// 3. Remove interior walls in one shuffled pass, skipping any whose removal
    ///    would open a 2x2 block.
    pub fn build_with_stats<R: Rng + ?Sized>(&self, rng: &mut R) -> (Grid, CarveStats) {
        let mut grid = Grid::filled_with_walls(self.columns, self.rows);
        for corner in self.lattice_corners() {
            grid.set_passable(corner, true);
        }

        let lattice_cells = self.carve_spanning_tree(&mut grid, rng);
        if self.open_corners {
            self.open_interior_corners(&mut grid);
        }
        let removal_target = self.removal_target();
        let walls_removed = self.remove_walls(&mut grid, removal_target, rng);

        debug!(
            "Generated {}x{} maze: {} lattice cells, {}/{} walls removed",
            self.columns, self.rows, lattice_cells, walls_removed, removal_target
        );

        (
            grid,
            CarveStats {
                lattice_cells,
                removal_target,
                walls_removed,
            },
        )
    }

    fn is_lattice(&self, pos: Position) -> bool {
        let last_row = Self::last_lattice(self.rows);
        let last_col = Self::last_lattice(self.columns);
        pos.row % 2 == 1 && pos.col % 2 == 1 && pos.row <= last_row && pos.col <= last_col
    }

    fn lattice_neighbours(&self, pos: Position) -> Vec<Position> {
        Direction::ALL
            .into_iter()
            .filter_map(|d| {
                let (dr, dc) = d.offset();
                let row = pos.row.checked_add_signed(dr * LATTICE_STEP as isize)?;
                let col = pos.col.checked_add_signed(dc * LATTICE_STEP as isize)?;
                Some(Position::new(row, col))
            })
            .filter(|p| self.is_lattice(*p))
            .collect()
    }

    /// Returns the number of lattice cells visited.
    fn carve_spanning_tree<R: Rng + ?Sized>(&self, grid: &mut Grid, rng: &mut R) -> usize {
        let start = Position::new(1, 1);
        let mut visited = HashSet::from([start]);
        let mut stack = vec![start];

        while let Some(&current) = stack.last() {
            let unvisited: Vec<Position> = self
                .lattice_neighbours(current)
                .into_iter()
                .filter(|p| !visited.contains(p))
                .collect();

            match unvisited.choose(rng) {
                Some(&next) => {
                    let between = Position::new(
                        (current.row + next.row) / 2,
                        (current.col + next.col) / 2,
                    );
                    grid.set_passable(between, true);
                    grid.set_passable(next, true);
                    visited.insert(next);
                    stack.push(next);
                }
                None => {
                    stack.pop();
                }
            }
        }

        visited.len()
    }

    /// Opens each interior corner. A corner left without an open neighbour
    /// sits diagonally off the lattice (both dimensions even) and also gets the
    /// elbow cell that links it to the nearest lattice corner.
    fn open_interior_corners(&self, grid: &mut Grid) {
        let lattice = self.lattice_corners();
        for corner in self.interior_corners() {
            grid.set_passable(corner, true);
            let isolated = grid.neighbours(corner).all(|n| !grid.is_passable(n));
            if !isolated {
                continue;
            }
            let nearest = lattice
                .iter()
                .copied()
                .min_by_key(|c| c.row.abs_diff(corner.row) + c.col.abs_diff(corner.col));
            if let Some(nearest) = nearest {
                grid.set_passable(Position::new(nearest.row, corner.col), true);
            }
        }
    }

    /// A wall can go when it is flanked by walls on opposite sides (so no 2x2
    /// floor block appears) and touches at least one floor cell (so it joins
    /// the existing component).
    fn is_removable(grid: &Grid, pos: Position) -> bool {
        let wall = |d: Direction| pos.step(d).map_or(true, |p| !grid.is_passable(p));
        let flanked = (wall(Direction::Left) && wall(Direction::Right))
            || (wall(Direction::Up) && wall(Direction::Down));
        let touches_floor = Direction::ALL.into_iter().any(|d| !wall(d));
        flanked && touches_floor
    }

    /// Single shuffled pass; stopping short of `target` is acceptable.
    fn remove_walls<R: Rng + ?Sized>(&self, grid: &mut Grid, target: usize, rng: &mut R) -> usize {
        let mut walls: Vec<Position> = grid
            .positions()
            .filter(|p| !grid.is_border(*p) && !grid.is_passable(*p))
            .collect();
        walls.shuffle(rng);

        let mut removed = 0;
        for wall in walls {
            if removed == target {
                break;
            }
            if Self::is_removable(grid, wall) {
                grid.set_passable(wall, true);
                removed += 1;
            }
        }

        if removed < target {
            debug!("Cycle pass removed {} of {} walls", removed, target);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn open_neighbour_counts(grid: &Grid) -> usize {
        grid.positions()
            .filter(|p| grid.is_passable(*p))
            .map(|p| grid.neighbours(p).filter(|n| grid.is_passable(*n)).count())
            .sum::<usize>()
            / 2
    }

    #[test]
    fn test_rejects_small_dimensions() {
        assert!(matches!(
            MazeBuilder::new(3, 10),
            Err(GameError::GridTooSmall { columns: 3, .. })
        ));
        assert!(MazeBuilder::new(10, 3).is_err());
        assert!(MazeBuilder::new(4, 4).is_ok());
    }

    #[test]
    fn test_lattice_corners_follow_parity() {
        let odd = MazeBuilder::new(11, 9).unwrap();
        assert_eq!(
            odd.lattice_corners(),
            [
                Position::new(1, 1),
                Position::new(1, 9),
                Position::new(7, 9),
                Position::new(7, 1)
            ]
        );

        let even = MazeBuilder::new(10, 20).unwrap();
        assert_eq!(
            even.lattice_corners(),
            [
                Position::new(1, 1),
                Position::new(1, 7),
                Position::new(17, 7),
                Position::new(17, 1)
            ]
        );
    }

    #[test]
    fn test_generated_grids_are_connected() {
        for seed in 0..40 {
            let mut rng = StdRng::seed_from_u64(seed);
            for (columns, rows) in [(4, 4), (5, 5), (10, 15), (20, 20), (21, 13), (32, 32)] {
                let grid = MazeBuilder::new(columns, rows).unwrap().build(&mut rng);
                assert!(
                    grid.is_connected(),
                    "seed {} produced a disconnected {}x{} maze",
                    seed,
                    columns,
                    rows
                );
            }
        }
    }

    #[test]
    fn test_no_degenerate_blocks() {
        for seed in 0..40 {
            let mut rng = StdRng::seed_from_u64(seed);
            for (columns, rows) in [(4, 4), (6, 8), (15, 10), (20, 20), (31, 31), (32, 32)] {
                let grid = MazeBuilder::new(columns, rows).unwrap().build(&mut rng);
                let blocks = grid.degenerate_blocks();
                assert!(
                    blocks.is_empty(),
                    "seed {} {}x{}: degenerate 2x2 at {:?}",
                    seed,
                    columns,
                    rows,
                    blocks
                );
            }
        }
    }

    #[test]
    fn test_removal_bound() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            for (columns, rows) in [(4, 4), (10, 15), (20, 20), (32, 32)] {
                let (_, stats) = MazeBuilder::new(columns, rows)
                    .unwrap()
                    .build_with_stats(&mut rng);
                let bound = ((columns - 2) * (rows - 2)) as f64 * 0.12;
                assert!(stats.walls_removed <= bound as usize);
                assert_eq!(stats.removal_target, bound as usize);
            }
        }
    }

    #[test]
    fn test_border_stays_wall() {
        let mut rng = StdRng::seed_from_u64(7);
        let grid = MazeBuilder::new(20, 20).unwrap().build(&mut rng);
        for pos in grid.positions().filter(|p| grid.is_border(*p)) {
            assert!(!grid.is_passable(pos), "border cell {} is open", pos);
        }
    }

    #[test]
    fn test_spanning_tree_without_cycle_pass() {
        let mut rng = StdRng::seed_from_u64(11);
        let builder = MazeBuilder::new(21, 21).unwrap().with_removal_ratio(0.0);
        let (grid, stats) = builder.build_with_stats(&mut rng);

        // 10x10 lattice, every cell reached
        assert_eq!(stats.lattice_cells, 100);
        assert_eq!(stats.walls_removed, 0);
        // a tree has exactly one edge fewer than it has nodes
        assert_eq!(open_neighbour_counts(&grid), grid.passable_count() - 1);
        assert!(grid.is_connected());
    }

    #[test]
    fn test_cycle_pass_adds_cycles() {
        let mut rng = StdRng::seed_from_u64(3);
        let (grid, stats) = MazeBuilder::new(31, 31).unwrap().build_with_stats(&mut rng);
        assert!(stats.walls_removed > 0);
        assert!(open_neighbour_counts(&grid) > grid.passable_count() - 1);
    }

    #[test]
    fn test_lattice_corners_are_open() {
        let mut rng = StdRng::seed_from_u64(5);
        let builder = MazeBuilder::new(12, 9).unwrap();
        let grid = builder.build(&mut rng);
        for corner in builder.lattice_corners() {
            assert!(grid.is_passable(corner));
        }
    }

    #[test]
    fn test_open_corners_join_the_maze() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            for (columns, rows) in [(20, 20), (12, 9), (9, 12), (21, 21), (32, 32)] {
                let builder = MazeBuilder::new(columns, rows).unwrap().with_open_corners();
                let grid = builder.build(&mut rng);
                for corner in builder.interior_corners() {
                    assert!(grid.is_passable(corner), "{} closed in {}x{}", corner, columns, rows);
                }
                assert!(grid.is_connected(), "seed {} {}x{}", seed, columns, rows);
                assert!(
                    grid.degenerate_blocks().is_empty(),
                    "seed {} {}x{}: {:?}",
                    seed,
                    columns,
                    rows,
                    grid.degenerate_blocks()
                );
            }
        }
    }

    #[test]
    fn test_diagonal_corner_gets_one_elbow() {
        let mut rng = StdRng::seed_from_u64(2);
        let grid = MazeBuilder::new(10, 10)
            .unwrap()
            .with_removal_ratio(0.0)
            .with_open_corners()
            .build(&mut rng);
        // (8, 8) is diagonal to lattice corner (7, 7); only (7, 8) links them
        assert!(grid.is_passable(Position::new(8, 8)));
        assert!(grid.is_passable(Position::new(7, 8)));
        assert!(!grid.is_passable(Position::new(8, 7)));
    }

    #[test]
    fn test_walls_start_invisible() {
        let grid = Grid::filled_with_walls(5, 5);
        assert_eq!(grid.passable_count(), 0);
        assert!(grid.positions().all(|p| !grid.is_visible(p)));
    }

    #[test]
    fn test_from_ascii() {
        let grid = Grid::from_ascii(&["####", "#..#", "#.##", "####"]).unwrap();
        assert_eq!(grid.columns(), 4);
        assert_eq!(grid.rows(), 4);
        assert!(grid.is_passable(Position::new(1, 1)));
        assert!(grid.is_passable(Position::new(2, 1)));
        assert!(!grid.is_passable(Position::new(2, 2)));
        assert!(grid.is_connected());

        assert!(Grid::from_ascii(&["####", "#..#", "#.#", "####"]).is_err());
        assert!(Grid::from_ascii(&["###", "#.#", "###"]).is_err());
    }

    #[test]
    fn test_degenerate_block_detection() {
        let open = Grid::from_ascii(&["#####", "#...#", "#...#", "#####"]).unwrap();
        assert!(!open.degenerate_blocks().is_empty());

        let closed = Grid::from_ascii(&["######", "#....#", "#.##.#", "#.##.#", "#....#", "######"])
            .unwrap();
        assert_eq!(closed.degenerate_blocks(), vec![Position::new(2, 2)]);
    }
}
