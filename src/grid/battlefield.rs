//! Per-session battlefield state: tiles, occupancy, and the path cache

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::types::UnitId;
use crate::grid::position::GridPos;
use crate::grid::terrain::Terrain;
use crate::grid::tile::{Tile, TileStatus};

/// Cache key for a pathfinding query
///
/// Two queries that differ in any option must not alias, so the full query
/// participates in the key. The range bound is wrapped so the key stays
/// hashable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathKey {
    pub start: GridPos,
    pub goal: GridPos,
    pub ignore_occupants: bool,
    pub flying: bool,
    pub max_range: Option<OrderedFloat<f32>>,
}

/// Grid dimensions on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub width: i32,
    pub height: i32,
}

/// Wire form of one tile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileSnapshot {
    pub position: GridPos,
    pub terrain_type: Terrain,
    pub status: TileStatus,
    pub occupant: Option<UnitId>,
    pub height: f32,
    pub highlight: Option<String>,
    pub effects: Vec<String>,
}

/// Wire form of a whole battlefield
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattlefieldSnapshot {
    pub size: GridSize,
    pub tiles: Vec<TileSnapshot>,
}

/// A session's grid: tile table, objectives, and cached path results
#[derive(Debug, Clone)]
pub struct Battlefield {
    pub width: i32,
    pub height: i32,
    tiles: AHashMap<GridPos, Tile>,
    objectives: Vec<GridPos>,
    path_cache: AHashMap<PathKey, Vec<GridPos>>,
}

impl Battlefield {
    /// Create a battlefield of empty plains
    pub fn new(width: i32, height: i32) -> Self {
        let mut tiles = AHashMap::with_capacity((width * height) as usize);

        for x in 0..width {
            for y in 0..height {
                let pos = GridPos::new(x, y);
                tiles.insert(pos, Tile::new(pos));
            }
        }

        Self {
            width,
            height,
            tiles,
            objectives: Vec::new(),
            path_cache: AHashMap::new(),
        }
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn tile(&self, pos: GridPos) -> Option<&Tile> {
        self.tiles.get(&pos)
    }

    pub(crate) fn tile_mut(&mut self, pos: GridPos) -> Option<&mut Tile> {
        self.tiles.get_mut(&pos)
    }

    /// Set terrain, invalidating cached paths; false when out of bounds
    pub fn set_terrain(&mut self, pos: GridPos, terrain: Terrain) -> bool {
        match self.tiles.get_mut(&pos) {
            Some(tile) => {
                tile.terrain = terrain;
                self.invalidate_paths();
                true
            }
            None => false,
        }
    }

    /// Set tile height, invalidating cached paths; false when out of bounds
    pub fn set_height(&mut self, pos: GridPos, height: f32) -> bool {
        match self.tiles.get_mut(&pos) {
            Some(tile) => {
                tile.height = height;
                self.invalidate_paths();
                true
            }
            None => false,
        }
    }

    /// Place a unit on a tile
    ///
    /// Fails without mutating when the tile is out of bounds, already
    /// occupied, or blocked.
    pub fn occupy(&mut self, pos: GridPos, unit: UnitId) -> bool {
        match self.tiles.get_mut(&pos) {
            Some(tile) if tile.occupant.is_none() && tile.status != TileStatus::Blocked => {
                tile.occupant = Some(unit);
                tile.status = TileStatus::Occupied;
                self.invalidate_paths();
                true
            }
            _ => false,
        }
    }

    /// Remove the occupant from a tile
    ///
    /// Fails when the tile is not occupied. Marked objectives revert to
    /// Objective status, everything else to Empty.
    pub fn vacate(&mut self, pos: GridPos) -> bool {
        let is_objective = self.objectives.contains(&pos);
        match self.tiles.get_mut(&pos) {
            Some(tile) if tile.occupant.is_some() => {
                tile.occupant = None;
                tile.status = if is_objective {
                    TileStatus::Objective
                } else {
                    TileStatus::Empty
                };
                self.invalidate_paths();
                true
            }
            _ => false,
        }
    }

    pub fn occupant(&self, pos: GridPos) -> Option<UnitId> {
        self.tiles.get(&pos).and_then(|t| t.occupant)
    }

    /// Register a capture point; false when out of bounds
    pub fn mark_objective(&mut self, pos: GridPos) -> bool {
        match self.tiles.get_mut(&pos) {
            Some(tile) => {
                if !self.objectives.contains(&pos) {
                    self.objectives.push(pos);
                }
                if tile.occupant.is_none() {
                    tile.status = TileStatus::Objective;
                }
                true
            }
            None => false,
        }
    }

    pub fn objectives(&self) -> &[GridPos] {
        &self.objectives
    }

    /// Can a unit enter this tile? Out of bounds counts as impassable.
    pub fn is_passable(&self, pos: GridPos, ignore_occupants: bool, flying: bool) -> bool {
        self.tiles
            .get(&pos)
            .map(|t| t.is_passable(ignore_occupants, flying))
            .unwrap_or(false)
    }

    /// In-bounds adjacent positions
    pub fn neighbors(&self, pos: GridPos, include_diagonals: bool) -> Vec<GridPos> {
        pos.neighbors(include_diagonals)
            .into_iter()
            .filter(|p| self.in_bounds(*p))
            .collect()
    }

    /// Add an effect tag to a tile; false when out of bounds
    pub fn add_effect(&mut self, pos: GridPos, tag: &str) -> bool {
        match self.tiles.get_mut(&pos) {
            Some(tile) => {
                tile.add_effect(tag);
                true
            }
            None => false,
        }
    }

    /// Set the UI highlight on a tile; false when out of bounds
    pub fn set_highlight(&mut self, pos: GridPos, tag: &str) -> bool {
        match self.tiles.get_mut(&pos) {
            Some(tile) => {
                tile.highlight = Some(tag.to_string());
                true
            }
            None => false,
        }
    }

    /// Clear every UI highlight
    pub fn clear_highlights(&mut self) {
        for tile in self.tiles.values_mut() {
            tile.highlight = None;
        }
    }

    /// Serializable copy of the whole grid, tiles in row-major order
    pub fn snapshot(&self) -> BattlefieldSnapshot {
        let mut tiles = Vec::with_capacity(self.tiles.len());
        for y in 0..self.height {
            for x in 0..self.width {
                if let Some(tile) = self.tiles.get(&GridPos::new(x, y)) {
                    tiles.push(TileSnapshot {
                        position: tile.position,
                        terrain_type: tile.terrain,
                        status: tile.status,
                        occupant: tile.occupant,
                        height: tile.height,
                        highlight: tile.highlight.clone(),
                        effects: tile.effects.clone(),
                    });
                }
            }
        }

        BattlefieldSnapshot {
            size: GridSize {
                width: self.width,
                height: self.height,
            },
            tiles,
        }
    }

    // ===== PATH CACHE =====

    pub(crate) fn cached_path(&self, key: &PathKey) -> Option<Vec<GridPos>> {
        self.path_cache.get(key).cloned()
    }

    pub(crate) fn store_path(&mut self, key: PathKey, path: Vec<GridPos>) {
        self.path_cache.insert(key, path);
    }

    /// Drop every cached path; called on any terrain, height, or
    /// occupancy change
    fn invalidate_paths(&mut self) {
        self.path_cache.clear();
    }

    #[cfg(test)]
    pub(crate) fn cached_path_count(&self) -> usize {
        self.path_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battlefield_creation() {
        let field = Battlefield::new(10, 8);
        assert_eq!(field.width, 10);
        assert_eq!(field.height, 8);
        assert!(field.tile(GridPos::new(9, 7)).is_some());
        assert!(field.tile(GridPos::new(10, 0)).is_none());
    }

    #[test]
    fn test_occupy_and_vacate() {
        let mut field = Battlefield::new(5, 5);
        let unit = UnitId::new();
        let pos = GridPos::new(2, 2);

        assert!(field.occupy(pos, unit));
        assert_eq!(field.occupant(pos), Some(unit));
        assert_eq!(field.tile(pos).unwrap().status, TileStatus::Occupied);

        assert!(field.vacate(pos));
        assert_eq!(field.occupant(pos), None);
        assert_eq!(field.tile(pos).unwrap().status, TileStatus::Empty);
    }

    #[test]
    fn test_occupy_occupied_tile_fails() {
        let mut field = Battlefield::new(5, 5);
        let pos = GridPos::new(1, 1);
        let first = UnitId::new();

        assert!(field.occupy(pos, first));
        assert!(!field.occupy(pos, UnitId::new()));
        // Loser left no trace
        assert_eq!(field.occupant(pos), Some(first));
    }

    #[test]
    fn test_occupy_out_of_bounds_fails() {
        let mut field = Battlefield::new(5, 5);
        assert!(!field.occupy(GridPos::new(7, 7), UnitId::new()));
    }

    #[test]
    fn test_vacate_empty_tile_fails() {
        let mut field = Battlefield::new(5, 5);
        assert!(!field.vacate(GridPos::new(2, 2)));
    }

    #[test]
    fn test_vacate_restores_objective_status() {
        let mut field = Battlefield::new(5, 5);
        let pos = GridPos::new(3, 3);

        assert!(field.mark_objective(pos));
        assert_eq!(field.tile(pos).unwrap().status, TileStatus::Objective);

        field.occupy(pos, UnitId::new());
        assert_eq!(field.tile(pos).unwrap().status, TileStatus::Occupied);

        field.vacate(pos);
        assert_eq!(field.tile(pos).unwrap().status, TileStatus::Objective);
    }

    #[test]
    fn test_set_terrain_out_of_bounds_fails() {
        let mut field = Battlefield::new(5, 5);
        assert!(!field.set_terrain(GridPos::new(-1, 0), Terrain::Forest));
        assert!(field.set_terrain(GridPos::new(0, 0), Terrain::Forest));
    }

    #[test]
    fn test_terrain_change_invalidates_cache() {
        let mut field = Battlefield::new(5, 5);
        let key = PathKey {
            start: GridPos::new(0, 0),
            goal: GridPos::new(4, 4),
            ignore_occupants: false,
            flying: false,
            max_range: None,
        };

        field.store_path(key, vec![GridPos::new(0, 0), GridPos::new(4, 4)]);
        assert_eq!(field.cached_path_count(), 1);

        field.set_terrain(GridPos::new(2, 2), Terrain::Walls);
        assert_eq!(field.cached_path_count(), 0);
    }

    #[test]
    fn test_occupancy_change_invalidates_cache() {
        let mut field = Battlefield::new(5, 5);
        let key = PathKey {
            start: GridPos::new(0, 0),
            goal: GridPos::new(4, 0),
            ignore_occupants: false,
            flying: false,
            max_range: None,
        };

        field.store_path(key, vec![]);
        field.occupy(GridPos::new(1, 0), UnitId::new());
        assert_eq!(field.cached_path_count(), 0);
    }

    #[test]
    fn test_highlights_do_not_touch_cache() {
        let mut field = Battlefield::new(5, 5);
        let key = PathKey {
            start: GridPos::new(0, 0),
            goal: GridPos::new(4, 0),
            ignore_occupants: false,
            flying: false,
            max_range: None,
        };

        field.store_path(key, vec![]);
        field.set_highlight(GridPos::new(1, 0), "move_range");
        field.add_effect(GridPos::new(1, 0), "smoke");
        assert_eq!(field.cached_path_count(), 1);
    }

    #[test]
    fn test_snapshot_row_major_order() {
        let mut field = Battlefield::new(3, 2);
        field.set_terrain(GridPos::new(1, 0), Terrain::Road);

        let snap = field.snapshot();
        assert_eq!(snap.size.width, 3);
        assert_eq!(snap.tiles.len(), 6);
        assert_eq!(snap.tiles[0].position, GridPos::new(0, 0));
        assert_eq!(snap.tiles[1].terrain_type, Terrain::Road);
        assert_eq!(snap.tiles[5].position, GridPos::new(2, 1));
    }
}
