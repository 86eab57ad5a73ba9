//! [`SearchNode`] over a room [`Grid`].

use crate::grid::{Cell, Grid, Position};
use crate::search::{Path, SearchLimits, SearchNode, search};

const ORTHOGONAL: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];
const DIAGONAL: [(i32, i32); 4] = [(1, 1), (-1, 1), (1, -1), (-1, -1)];

/// Largest height difference a single step may climb or drop.
pub const MAX_STEP_HEIGHT: i32 = 1;

/// A tile on a borrowed grid.
#[derive(Debug, Clone, Copy)]
pub struct GridNode<'g> {
    grid: &'g Grid,
    position: Position,
}

impl<'g> GridNode<'g> {
    /// Node for `position` on `grid`.
    pub fn new(grid: &'g Grid, position: Position) -> Self {
        Self { grid, position }
    }

    /// The tile this node stands on.
    pub fn position(&self) -> Position {
        self.position
    }

    fn step(&self, here: &Cell, dx: i32, dy: i32, parent: Option<&Position>) -> Option<(Self, f64)> {
        let target = self.position.offset(dx, dy);
        if parent == Some(&target) {
            return None;
        }
        let cell = self.grid.cell(target)?;
        if cell.is_blocked() || (cell.height - here.height).abs() > MAX_STEP_HEIGHT {
            return None;
        }
        Some((GridNode::new(self.grid, target), f64::from(cell.cost)))
    }
}

impl SearchNode for GridNode<'_> {
    type State = Position;

    fn state(&self) -> &Position {
        &self.position
    }

    fn heuristic(&self, goal: &Position) -> f64 {
        self.position.euclidean_distance(*goal)
    }

    fn successors(&self, parent: Option<&Position>) -> Vec<(Self, f64)> {
        let Some(here) = self.grid.cell(self.position) else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(8);
        out.extend(
            ORTHOGONAL
                .iter()
                .filter_map(|&(dx, dy)| self.step(here, dx, dy, parent)),
        );

        // No corner cutting: both flanking tiles must be open.
        for &(dx, dy) in &DIAGONAL {
            if self.grid.is_open(self.position.offset(dx, 0))
                && self.grid.is_open(self.position.offset(0, dy))
                && let Some(next) = self.step(here, dx, dy, parent)
            {
                out.push(next);
            }
        }
        out
    }
}

/// Cheapest route across `grid`, or `None` when unreachable.
pub fn find_path(grid: &Grid, start: Position, goal: Position) -> Option<Path<Position>> {
    find_path_with_limits(grid, start, goal, SearchLimits::UNBOUNDED)
}

/// [`find_path`] with a cap on the work done.
pub fn find_path_with_limits(
    grid: &Grid,
    start: Position,
    goal: Position,
    limits: SearchLimits,
) -> Option<Path<Position>> {
    if !grid.contains(start) || !grid.is_open(goal) {
        return None;
    }
    search(GridNode::new(grid, start), &goal, limits)
}

impl Path<Position> {
    /// Tiles in travel order.
    pub fn positions(&self) -> Vec<Position> {
        self.states().copied().collect()
    }
}
