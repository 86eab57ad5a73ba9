//! Movement resolution on tile grids.
//!
//! [`search`] is a generic best-first (A*) engine over any [`SearchNode`];
//! [`GridNode`] adapts it to room grids with blocked tiles and step heights.
//! [`next_step`] is a constant-time approximation that ignores obstacles.

pub mod fallback;
pub mod grid;
pub mod grid_node;
pub mod search;

pub use fallback::next_step;
pub use grid::{BLOCKED, Cell, Grid, GridError, Position};
pub use grid_node::{GridNode, find_path, find_path_with_limits};
pub use search::{Path, PathNode, PathStep, SearchLimits, SearchNode, search};
