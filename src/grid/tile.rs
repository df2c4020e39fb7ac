//! Battlefield tiles and occupancy state

use crate::core::types::UnitId;
use crate::grid::position::GridPos;
use crate::grid::terrain::Terrain;
use serde::{Deserialize, Serialize};

/// Occupancy state of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    #[default]
    Empty,
    Occupied,
    /// Impassable regardless of occupancy (rubble, hazards)
    Blocked,
    /// Capture point; reverts here when vacated
    Objective,
}

/// One tile of a battlefield
///
/// Invariant: `status == Occupied` exactly when `occupant` is set. Occupancy
/// changes only through [`Battlefield::occupy`] and [`Battlefield::vacate`],
/// which keep the two fields in step.
///
/// [`Battlefield::occupy`]: crate::grid::Battlefield::occupy
/// [`Battlefield::vacate`]: crate::grid::Battlefield::vacate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub position: GridPos,
    pub terrain: Terrain,
    pub status: TileStatus,
    pub occupant: Option<UnitId>,
    pub height: f32,
    /// UI hint (movement range, attack preview); no gameplay meaning
    pub highlight: Option<String>,
    /// Active effect tags (fire, smoke, webs)
    pub effects: Vec<String>,
}

impl Tile {
    pub fn new(position: GridPos) -> Self {
        Self {
            position,
            terrain: Terrain::Plains,
            status: TileStatus::Empty,
            occupant: None,
            height: 0.0,
            highlight: None,
            effects: Vec::new(),
        }
    }

    /// Can a unit enter this tile?
    pub fn is_passable(&self, ignore_occupants: bool, flying: bool) -> bool {
        if self.status == TileStatus::Blocked {
            return false;
        }
        let terrain_ok = if flying {
            self.terrain.can_fly_over()
        } else {
            !self.terrain.blocks_movement()
        };
        terrain_ok && (ignore_occupants || self.occupant.is_none())
    }

    /// Add an effect tag; repeated tags are kept once
    pub fn add_effect(&mut self, tag: &str) {
        if !self.effects.iter().any(|e| e == tag) {
            self.effects.push(tag.to_string());
        }
    }

    /// Remove an effect tag, returning whether it was present
    pub fn remove_effect(&mut self, tag: &str) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e != tag);
        self.effects.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tile_is_empty_plains() {
        let tile = Tile::new(GridPos::new(2, 3));
        assert_eq!(tile.terrain, Terrain::Plains);
        assert_eq!(tile.status, TileStatus::Empty);
        assert!(tile.occupant.is_none());
    }

    #[test]
    fn test_occupied_tile_passable_only_when_ignoring() {
        let mut tile = Tile::new(GridPos::new(0, 0));
        tile.occupant = Some(UnitId::new());
        tile.status = TileStatus::Occupied;
        assert!(!tile.is_passable(false, false));
        assert!(tile.is_passable(true, false));
    }

    #[test]
    fn test_blocked_tile_stops_fliers_too() {
        let mut tile = Tile::new(GridPos::new(0, 0));
        tile.status = TileStatus::Blocked;
        assert!(!tile.is_passable(true, true));
    }

    #[test]
    fn test_flier_crosses_water_not_walls() {
        let mut tile = Tile::new(GridPos::new(0, 0));
        tile.terrain = Terrain::Water;
        assert!(!tile.is_passable(false, false));
        assert!(tile.is_passable(false, true));

        tile.terrain = Terrain::Walls;
        assert!(!tile.is_passable(false, true));
    }

    #[test]
    fn test_effect_tags_are_idempotent() {
        let mut tile = Tile::new(GridPos::new(0, 0));
        tile.add_effect("fire");
        tile.add_effect("fire");
        assert_eq!(tile.effects.len(), 1);
        assert!(tile.remove_effect("fire"));
        assert!(!tile.remove_effect("fire"));
    }
}
