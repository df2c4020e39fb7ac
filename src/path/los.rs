//! Line-of-sight checks over the tile grid

use crate::grid::battlefield::Battlefield;
use crate::grid::position::GridPos;

/// Rasterize the straight line from `a` to `b`, endpoints included
///
/// Integer Bresenham; every returned position is a grid tile the sight
/// line crosses.
pub fn line_between(a: GridPos, b: GridPos) -> Vec<GridPos> {
    let mut points = Vec::new();

    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };

    let mut err = dx + dy;
    let mut x = a.x;
    let mut y = a.y;

    loop {
        points.push(GridPos::new(x, y));
        if x == b.x && y == b.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }

    points
}

/// Can `from` see `to`?
///
/// Only interior tiles block: a unit standing in a forest can see out and
/// be seen, but sight never passes through one. Out-of-bounds endpoints
/// never have sight.
pub fn line_of_sight(field: &Battlefield, from: GridPos, to: GridPos) -> bool {
    if !field.in_bounds(from) || !field.in_bounds(to) {
        return false;
    }

    let line = line_between(from, to);
    for pos in line.iter().skip(1).take(line.len().saturating_sub(2)) {
        if let Some(tile) = field.tile(*pos) {
            if tile.terrain.blocks_vision() {
                return false;
            }
        }
    }

    true
}
