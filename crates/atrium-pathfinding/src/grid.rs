//! Tile grid: per-cell movement cost and height.

use std::fmt;

/// Cost sentinel marking an impassable cell.
pub const BLOCKED: i32 = -1;

/// Integer tile coordinates. Negative values are valid positions that simply
/// fall outside every grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Position {
    /// Create a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// This position shifted by `(dx, dy)`.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Straight-line distance to `other`.
    pub fn euclidean_distance(self, other: Position) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        dx.hypot(dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One grid tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    /// Cost of stepping onto this tile, or [`BLOCKED`].
    pub cost: i32,
    /// Floor height; steps may change height by at most one.
    pub height: i32,
}

impl Cell {
    /// A passable tile.
    pub const fn open(cost: i32, height: i32) -> Self {
        Self { cost, height }
    }

    /// An impassable tile.
    pub const fn blocked() -> Self {
        Self {
            cost: BLOCKED,
            height: 0,
        }
    }

    /// Whether the tile cannot be entered.
    pub const fn is_blocked(&self) -> bool {
        self.cost < 0
    }
}

/// Errors from parsing a heightmap.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The heightmap has no rows.
    #[error("heightmap is empty")]
    Empty,

    /// A row is a different width from the first.
    #[error("row {row} has width {width}, expected {expected}")]
    RaggedRow {
        /// Zero-based row index.
        row: usize,
        /// That row's width.
        width: usize,
        /// The first row's width.
        expected: usize,
    },

    /// A character that is neither a digit nor `x`.
    #[error("invalid tile '{ch}' at ({x}, {y})")]
    InvalidTile {
        /// The character.
        ch: char,
        /// Column.
        x: usize,
        /// Row.
        y: usize,
    },
}

/// Rectangular grid of [`Cell`]s stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// A `width` x `height` grid of open, zero-cost, zero-height cells.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width * height],
        }
    }

    /// Parse a room heightmap.
    ///
    /// Rows are separated by `\r`, `\n` or both; blank lines are ignored.
    /// Digits `0`-`9` are open tiles of that height costing `open_cost`,
    /// `x`/`X` is blocked.
    pub fn from_heightmap(map: &str, open_cost: i32) -> Result<Self, GridError> {
        let rows: Vec<&str> = map
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|row| !row.is_empty())
            .collect();

        let expected = rows.first().map(|row| row.chars().count()).ok_or(GridError::Empty)?;
        let mut grid = Grid::new(expected, rows.len());

        for (y, row) in rows.iter().enumerate() {
            let width = row.chars().count();
            if width != expected {
                return Err(GridError::RaggedRow {
                    row: y,
                    width,
                    expected,
                });
            }
            for (x, ch) in row.chars().enumerate() {
                let cell = match ch {
                    'x' | 'X' => Cell::blocked(),
                    _ => match ch.to_digit(10) {
                        Some(h) => Cell::open(open_cost, h as i32),
                        None => return Err(GridError::InvalidTile { ch, x, y }),
                    },
                };
                grid.cells[y * expected + x] = cell;
            }
        }

        Ok(grid)
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        let x = usize::try_from(pos.x).ok()?;
        let y = usize::try_from(pos.y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Whether `pos` lies inside the grid.
    pub fn contains(&self, pos: Position) -> bool {
        self.index(pos).is_some()
    }

    /// The cell at `pos`, if inside the grid.
    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        self.index(pos).map(|i| &self.cells[i])
    }

    /// Whether `pos` is inside the grid and not blocked.
    pub fn is_open(&self, pos: Position) -> bool {
        self.cell(pos).is_some_and(|cell| !cell.is_blocked())
    }

    /// Replace the cell at `pos`. Returns false when `pos` is outside the grid.
    pub fn set_cell(&mut self, pos: Position, cell: Cell) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.cells[i] = cell;
                true
            }
            None => false,
        }
    }

    /// Set the movement cost at `pos` ([`BLOCKED`] to block it).
    pub fn set_cost(&mut self, pos: Position, cost: i32) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.cells[i].cost = cost;
                true
            }
            None => false,
        }
    }

    /// Set the floor height at `pos`.
    pub fn set_height(&mut self, pos: Position, height: i32) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.cells[i].height = height;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_is_open_and_flat() {
        let grid = Grid::new(4, 3);
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.cell(Position::new(3, 2)), Some(&Cell::open(0, 0)));
        assert!(grid.cell(Position::new(4, 0)).is_none());
        assert!(grid.cell(Position::new(-1, 0)).is_none());
    }

    #[test]
    fn test_set_cost_blocks() {
        let mut grid = Grid::new(2, 2);
        assert!(grid.set_cost(Position::new(1, 1), BLOCKED));
        assert!(!grid.is_open(Position::new(1, 1)));
        assert!(!grid.set_cost(Position::new(5, 5), 1));
    }

    #[test]
    fn test_heightmap_parse() {
        let grid = Grid::from_heightmap("xx00\r\n0012\r\n", 1).unwrap();
        assert_eq!((grid.width(), grid.height()), (4, 2));
        assert!(grid.cell(Position::new(0, 0)).unwrap().is_blocked());
        assert_eq!(grid.cell(Position::new(3, 1)), Some(&Cell::open(1, 2)));
    }

    #[test]
    fn test_heightmap_errors() {
        assert_eq!(Grid::from_heightmap("\r\n", 1), Err(GridError::Empty));
        assert!(matches!(
            Grid::from_heightmap("000\n00", 1),
            Err(GridError::RaggedRow { row: 1, .. })
        ));
        assert_eq!(
            Grid::from_heightmap("0?0", 1),
            Err(GridError::InvalidTile { ch: '?', x: 1, y: 0 })
        );
    }

    #[test]
    fn test_euclidean_distance() {
        let a = Position::new(0, 0);
        assert_eq!(a.euclidean_distance(Position::new(3, 4)), 5.0);
        assert_eq!(a.euclidean_distance(a), 0.0);
    }
}
