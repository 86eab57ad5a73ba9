//! Obstacle-blind single-step movement toward a goal.

use crate::grid::Position;

/// One step from `current` towards `goal`, ignoring obstacles and heights.
///
/// Moves diagonally while both axes differ, otherwise along the remaining
/// axis. Returns `current` once the goal is reached.
pub fn next_step(current: Position, goal: Position) -> Position {
    current.offset((goal.x - current.x).signum(), (goal.y - current.y).signum())
}
