//! A* pathfinding over battlefield tiles
//!
//! Respects terrain costs, occupancy, and flying movement.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::AHashMap;
use ordered_float::OrderedFloat;

use crate::grid::battlefield::{Battlefield, PathKey};
use crate::grid::position::{GridPos, DIAGONAL_COST};
use crate::grid::terrain::Terrain;

/// Slack for floating-point budget comparisons
pub(crate) const COST_EPSILON: f32 = 1e-4;

/// One pathfinding query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathQuery {
    pub start: GridPos,
    pub goal: GridPos,
    /// Treat occupied tiles as passable (planning through allies)
    pub ignore_occupants: bool,
    /// Use flying passability rules
    pub flying: bool,
    /// Abandon routes costing more than this
    pub max_range: Option<f32>,
}

impl PathQuery {
    pub fn new(start: GridPos, goal: GridPos) -> Self {
        Self {
            start,
            goal,
            ignore_occupants: false,
            flying: false,
            max_range: None,
        }
    }

    /// Cache key for this query
    pub(crate) fn key(&self) -> PathKey {
        PathKey {
            start: self.start,
            goal: self.goal,
            ignore_occupants: self.ignore_occupants,
            flying: self.flying,
            max_range: self.max_range.map(OrderedFloat),
        }
    }
}

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    pos: GridPos,
    f_cost: f32, // g_cost + heuristic
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cost of entering `to` from `from`
///
/// The destination terrain sets the base cost; diagonal steps pay the
/// sqrt(2) multiplier. Shared by A* and the reachability frontier so the
/// two can never disagree on budgets.
pub(crate) fn step_cost(field: &Battlefield, from: GridPos, to: GridPos) -> f32 {
    let base = match field.tile(to) {
        Some(tile) => tile.terrain.movement_cost(),
        None => return f32::INFINITY,
    };
    if from.is_diagonal_step(&to) {
        base * DIAGONAL_COST
    } else {
        base
    }
}

/// Admissible heuristic: octile distance scaled by the cheapest terrain
fn heuristic(pos: GridPos, goal: GridPos) -> f32 {
    pos.octile(&goal) * Terrain::min_passable_cost()
}

/// Find the cheapest path between two tiles
///
/// Returns the full tile sequence including both endpoints, or an empty
/// vector when no route exists (unreachable goal, impassable goal, or the
/// range budget exhausted). An empty result is an answer, not an error.
pub fn find_path(field: &Battlefield, query: &PathQuery) -> Vec<GridPos> {
    let PathQuery {
        start,
        goal,
        ignore_occupants,
        flying,
        max_range,
    } = *query;

    if start == goal {
        return vec![start];
    }
    if !field.is_passable(goal, ignore_occupants, flying) {
        return Vec::new();
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<GridPos, GridPos> = AHashMap::new();
    let mut g_scores: AHashMap<GridPos, f32> = AHashMap::new();

    g_scores.insert(start, 0.0);
    open_set.push(PathNode {
        pos: start,
        f_cost: heuristic(start, goal),
    });

    while let Some(current) = open_set.pop() {
        if current.pos == goal {
            return reconstruct_path(&came_from, current.pos);
        }

        let current_g = *g_scores.get(&current.pos).unwrap_or(&f32::INFINITY);

        for neighbor in field.neighbors(current.pos, true) {
            if !field.is_passable(neighbor, ignore_occupants, flying) {
                continue;
            }

            let tentative_g = current_g + step_cost(field, current.pos, neighbor);
            if let Some(limit) = max_range {
                if tentative_g > limit + COST_EPSILON {
                    continue;
                }
            }

            let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&f32::INFINITY);
            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.pos);
                g_scores.insert(neighbor, tentative_g);

                open_set.push(PathNode {
                    pos: neighbor,
                    f_cost: tentative_g + heuristic(neighbor, goal),
                });
            }
        }
    }

    Vec::new() // No route
}

/// Reconstruct path from the came_from map
fn reconstruct_path(came_from: &AHashMap<GridPos, GridPos>, mut current: GridPos) -> Vec<GridPos> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Movement cost of walking a path (entry cost per step; the start tile
/// is free)
pub fn path_cost(field: &Battlefield, path: &[GridPos]) -> f32 {
    path.windows(2)
        .map(|pair| step_cost(field, pair[0], pair[1]))
        .sum()
}
