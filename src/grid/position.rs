//! Square-grid coordinates and distance metrics

use serde::{Deserialize, Serialize};

/// Distance metric for range queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Taxicab distance: |dx| + |dy|
    #[default]
    Manhattan,
    /// Straight-line distance
    Euclidean,
    /// King-move distance: max(|dx|, |dy|)
    Chebyshev,
}

/// Tile coordinate on a battlefield grid
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

/// Step cost multiplier for diagonal movement
pub const DIAGONAL_COST: f32 = std::f32::consts::SQRT_2;

/// Cardinal steps in reading order
const CARDINAL: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// Diagonal steps
const DIAGONAL: [(i32, i32); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Distance to another position under the given metric
    pub fn distance(&self, other: &Self, metric: DistanceMetric) -> f32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        match metric {
            DistanceMetric::Manhattan => (dx + dy) as f32,
            DistanceMetric::Euclidean => ((dx * dx + dy * dy) as f32).sqrt(),
            DistanceMetric::Chebyshev => dx.max(dy) as f32,
        }
    }

    /// Shortest 8-connected step distance with diagonals costing sqrt(2)
    pub fn octile(&self, other: &Self) -> f32 {
        let dx = (self.x - other.x).abs() as f32;
        let dy = (self.y - other.y).abs() as f32;
        dx.max(dy) + (DIAGONAL_COST - 1.0) * dx.min(dy)
    }

    /// Adjacent positions, unfiltered by bounds
    pub fn neighbors(&self, include_diagonals: bool) -> Vec<GridPos> {
        let mut result = Vec::with_capacity(if include_diagonals { 8 } else { 4 });
        for (dx, dy) in CARDINAL {
            result.push(GridPos::new(self.x + dx, self.y + dy));
        }
        if include_diagonals {
            for (dx, dy) in DIAGONAL {
                result.push(GridPos::new(self.x + dx, self.y + dy));
            }
        }
        result
    }

    /// True when the step from self to other changes both axes
    pub fn is_diagonal_step(&self, other: &Self) -> bool {
        self.x != other.x && self.y != other.y
    }
}
