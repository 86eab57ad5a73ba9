//! Generic best-first search.
//!
//! Nodes live in an arena and refer to their parent by index, so the open set
//! only has to carry `(f, seq, index)` triples. The open set is a min-heap on
//! `f = g + h`; equal `f` values are served in insertion order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

/// A state the engine can expand.
pub trait SearchNode: Sized {
    /// Identity of the node. Two nodes with equal states are the same node.
    type State: Clone + Eq + Hash;

    /// This node's identity.
    fn state(&self) -> &Self::State;

    /// Estimated remaining cost from here to `goal`.
    fn heuristic(&self, goal: &Self::State) -> f64;

    /// Neighbouring nodes paired with the cost of moving onto each.
    ///
    /// `parent` is the state this node was reached from, if any.
    fn successors(&self, parent: Option<&Self::State>) -> Vec<(Self, f64)>;
}

/// Bounds on a single search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    /// Give up after this many nodes have been expanded.
    pub max_expansions: Option<usize>,
}

impl SearchLimits {
    /// No bound.
    pub const UNBOUNDED: Self = Self {
        max_expansions: None,
    };

    /// Stop after `max` expansions.
    pub const fn expansions(max: usize) -> Self {
        Self {
            max_expansions: Some(max),
        }
    }
}

/// A node together with its search bookkeeping.
#[derive(Debug, Clone)]
pub struct PathNode<N> {
    /// The wrapped node.
    pub node: N,
    /// Accumulated cost from the start.
    pub g: f64,
    /// Heuristic estimate to the goal.
    pub h: f64,
    /// Arena index of the node this one was reached from.
    pub parent: Option<usize>,
}

impl<N> PathNode<N> {
    /// Total estimated cost through this node.
    pub fn f(&self) -> f64 {
        self.g + self.h
    }
}

/// One step of a resolved route.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep<S> {
    /// State entered by this step.
    pub state: S,
    /// Accumulated cost after this step.
    pub g: f64,
    /// Heuristic estimate that was recorded for this state.
    pub h: f64,
}

/// A resolved route, excluding the start and including the goal.
///
/// An empty path means the start already was the goal.
#[derive(Debug, Clone, PartialEq)]
pub struct Path<S> {
    steps: Vec<PathStep<S>>,
}

impl<S> Path<S> {
    /// Steps in travel order.
    pub fn steps(&self) -> &[PathStep<S>] {
        &self.steps
    }

    /// Number of moves.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no movement is required.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The first move.
    pub fn first(&self) -> Option<&S> {
        self.steps.first().map(|step| &step.state)
    }

    /// Accumulated cost of the whole route.
    pub fn total_cost(&self) -> f64 {
        self.steps.last().map_or(0.0, |step| step.g)
    }

    /// States in travel order.
    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.steps.iter().map(|step| &step.state)
    }
}

impl<S> IntoIterator for Path<S> {
    type Item = PathStep<S>;
    type IntoIter = std::vec::IntoIter<PathStep<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

struct OpenEntry {
    f: f64,
    seq: u64,
    index: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    // Reversed so the max-heap yields the lowest f, then the oldest entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Find the cheapest route from `start` to `goal`.
///
/// Returns `None` when the open set is exhausted or `limits` is hit before the
/// goal is popped.
pub fn search<N: SearchNode>(start: N, goal: &N::State, limits: SearchLimits) -> Option<Path<N::State>> {
    let mut arena: Vec<PathNode<N>> = Vec::new();
    let mut open = BinaryHeap::new();
    let mut closed: FxHashSet<N::State> = FxHashSet::default();
    let mut best_g: FxHashMap<N::State, f64> = FxHashMap::default();
    let mut seq = 0u64;

    let h = start.heuristic(goal);
    best_g.insert(start.state().clone(), 0.0);
    arena.push(PathNode {
        node: start,
        g: 0.0,
        h,
        parent: None,
    });
    open.push(OpenEntry { f: h, seq, index: 0 });

    let mut expansions = 0usize;
    while let Some(OpenEntry { index, .. }) = open.pop() {
        let state = arena[index].node.state().clone();
        if closed.contains(&state) {
            continue;
        }
        if state == *goal {
            tracing::trace!(expansions, nodes = arena.len(), "route found");
            return Some(reconstruct(&arena, index));
        }

        if let Some(max) = limits.max_expansions
            && expansions >= max
        {
            tracing::debug!(max, "search abandoned at expansion limit");
            return None;
        }
        expansions += 1;
        closed.insert(state);

        let parent_state = arena[index].parent.map(|p| arena[p].node.state().clone());
        let g_here = arena[index].g;
        let successors = arena[index].node.successors(parent_state.as_ref());
        for (next, step_cost) in successors {
            let next_state = next.state();
            if closed.contains(next_state) {
                continue;
            }
            let g = g_here + step_cost;
            if best_g.get(next_state).is_some_and(|&known| known <= g) {
                continue;
            }
            best_g.insert(next_state.clone(), g);

            let h = next.heuristic(goal);
            seq += 1;
            open.push(OpenEntry {
                f: g + h,
                seq,
                index: arena.len(),
            });
            arena.push(PathNode {
                node: next,
                g,
                h,
                parent: Some(index),
            });
        }
    }

    tracing::trace!(expansions, "open set exhausted");
    None
}

fn reconstruct<N: SearchNode>(arena: &[PathNode<N>], goal_index: usize) -> Path<N::State> {
    let mut steps = Vec::new();
    let mut cursor = goal_index;
    while let Some(parent) = arena[cursor].parent {
        let entry = &arena[cursor];
        steps.push(PathStep {
            state: entry.node.state().clone(),
            g: entry.g,
            h: entry.h,
        });
        cursor = parent;
    }
    steps.reverse();
    Path { steps }
}
