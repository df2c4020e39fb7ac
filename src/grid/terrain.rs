//! Terrain types and their movement/vision effects

use serde::{Deserialize, Serialize};

/// Base terrain of a battlefield tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Plains, // No penalty
    Forest,    // Slow, blocks sight
    Mountains, // Very slow, high ground
    Water,     // Impassable on foot, fliers cross
    Walls,     // Impassable for everyone
    Rough,     // Slight penalty
    Road,      // Faster than open ground
}

impl Terrain {
    pub const ALL: [Terrain; 7] = [
        Terrain::Plains,
        Terrain::Forest,
        Terrain::Mountains,
        Terrain::Water,
        Terrain::Walls,
        Terrain::Rough,
        Terrain::Road,
    ];

    /// Movement cost multiplier (1.0 = normal, INFINITY = impassable)
    pub fn movement_cost(&self) -> f32 {
        match self {
            Terrain::Plains => 1.0,
            Terrain::Forest => 2.0,
            Terrain::Mountains => 3.0,
            Terrain::Water => f32::INFINITY,
            Terrain::Walls => f32::INFINITY,
            Terrain::Rough => 1.5,
            Terrain::Road => 0.7,
        }
    }

    /// Defense modifier applied to an occupant (additive)
    pub fn defense_modifier(&self) -> f32 {
        match self {
            Terrain::Plains => 0.0,
            Terrain::Forest => 0.2,
            Terrain::Mountains => 0.3,
            Terrain::Water => 0.0,
            Terrain::Walls => 0.0,
            Terrain::Rough => 0.1,
            Terrain::Road => -0.1, // Exposed
        }
    }

    /// Accuracy modifier for attacks fired from this tile (additive)
    pub fn accuracy_modifier(&self) -> f32 {
        match self {
            Terrain::Plains => 0.0,
            Terrain::Forest => -0.1,
            Terrain::Mountains => 0.1, // High ground
            Terrain::Water => 0.0,
            Terrain::Walls => 0.0,
            Terrain::Rough => 0.0,
            Terrain::Road => 0.0,
        }
    }

    /// Does this terrain block line of sight?
    pub fn blocks_vision(&self) -> bool {
        matches!(self, Terrain::Forest | Terrain::Mountains | Terrain::Walls)
    }

    /// Is ground movement through this terrain impossible?
    pub fn blocks_movement(&self) -> bool {
        self.movement_cost().is_infinite()
    }

    /// Can flying units cross this terrain?
    pub fn can_fly_over(&self) -> bool {
        !matches!(self, Terrain::Walls)
    }

    /// Cheapest finite movement cost across all terrain types
    ///
    /// Scale factor that keeps the pathfinding heuristic admissible when
    /// cheap tiles (roads) exist.
    pub fn min_passable_cost() -> f32 {
        Terrain::ALL
            .iter()
            .map(|t| t.movement_cost())
            .filter(|c| c.is_finite())
            .fold(f32::INFINITY, f32::min)
    }
}
