//! Movement-range queries: every tile a budget can reach

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::AHashMap;
use ordered_float::OrderedFloat;

use crate::grid::battlefield::Battlefield;
use crate::grid::position::GridPos;
use crate::path::astar::{step_cost, COST_EPSILON};

/// All tiles reachable from `start` within `max_movement`
///
/// Uniform-cost expansion over cardinal steps: the frontier pops in cost
/// order, so a tile's first settled cost is its cheapest and expensive
/// tiles can never shadow cheaper routes. The start tile itself is
/// excluded; entering a tile costs its terrain value. Results come back
/// sorted by position for stable rendering.
pub fn reachable_tiles(
    field: &Battlefield,
    start: GridPos,
    max_movement: f32,
    ignore_occupants: bool,
    flying: bool,
) -> Vec<GridPos> {
    if max_movement <= 0.0 || !field.in_bounds(start) {
        return Vec::new();
    }

    let mut best: AHashMap<GridPos, f32> = AHashMap::new();
    let mut frontier: BinaryHeap<(Reverse<OrderedFloat<f32>>, GridPos)> = BinaryHeap::new();

    best.insert(start, 0.0);
    frontier.push((Reverse(OrderedFloat(0.0)), start));

    while let Some((Reverse(OrderedFloat(cost)), pos)) = frontier.pop() {
        // Stale entry from a later, cheaper relaxation
        if cost > *best.get(&pos).unwrap_or(&f32::INFINITY) + COST_EPSILON {
            continue;
        }

        for neighbor in field.neighbors(pos, false) {
            if !field.is_passable(neighbor, ignore_occupants, flying) {
                continue;
            }

            let next_cost = cost + step_cost(field, pos, neighbor);
            if next_cost > max_movement + COST_EPSILON {
                continue;
            }

            let known = *best.get(&neighbor).unwrap_or(&f32::INFINITY);
            if next_cost < known {
                best.insert(neighbor, next_cost);
                frontier.push((Reverse(OrderedFloat(next_cost)), neighbor));
            }
        }
    }

    let mut tiles: Vec<GridPos> = best.into_keys().filter(|p| *p != start).collect();
    tiles.sort();
    tiles
}

/// Cheapest movement cost to each reachable tile, start included at zero
pub fn reachable_costs(
    field: &Battlefield,
    start: GridPos,
    max_movement: f32,
    ignore_occupants: bool,
    flying: bool,
) -> AHashMap<GridPos, f32> {
    let mut best: AHashMap<GridPos, f32> = AHashMap::new();
    if max_movement < 0.0 || !field.in_bounds(start) {
        return best;
    }

    let mut frontier: BinaryHeap<(Reverse<OrderedFloat<f32>>, GridPos)> = BinaryHeap::new();
    best.insert(start, 0.0);
    frontier.push((Reverse(OrderedFloat(0.0)), start));

    while let Some((Reverse(OrderedFloat(cost)), pos)) = frontier.pop() {
        if cost > *best.get(&pos).unwrap_or(&f32::INFINITY) + COST_EPSILON {
            continue;
        }

        for neighbor in field.neighbors(pos, false) {
            if !field.is_passable(neighbor, ignore_occupants, flying) {
                continue;
            }

            let next_cost = cost + step_cost(field, pos, neighbor);
            if next_cost > max_movement + COST_EPSILON {
                continue;
            }

            let known = *best.get(&neighbor).unwrap_or(&f32::INFINITY);
            if next_cost < known {
                best.insert(neighbor, next_cost);
                frontier.push((Reverse(OrderedFloat(next_cost)), neighbor));
            }
        }
    }

    best
}
