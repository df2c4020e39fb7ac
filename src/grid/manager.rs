//! Session-keyed battlefield registry and spatial queries
//!
//! One `SpatialGrid` serves every live session. Lookups take the session
//! id; handing in an id that was never initialized (or already removed) is
//! a programmer error and panics. Gameplay failures stay sentinel returns.

use ahash::AHashMap;

use crate::core::types::{SessionId, UnitId};
use crate::grid::battlefield::{Battlefield, BattlefieldSnapshot};
use crate::grid::position::{DistanceMetric, GridPos};
use crate::grid::terrain::Terrain;
use crate::path::area::{self, EffectPattern};
use crate::path::astar::{self, PathQuery};
use crate::path::los;
use crate::path::reachable;

/// Registry of per-session battlefields
#[derive(Debug, Default)]
pub struct SpatialGrid {
    fields: AHashMap<SessionId, Battlefield>,
}

impl SpatialGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) the battlefield for a session
    pub fn initialize(&mut self, session: SessionId, width: i32, height: i32) {
        tracing::debug!(?session, width, height, "battlefield initialized");
        self.fields.insert(session, Battlefield::new(width, height));
    }

    /// Drop a session's battlefield; false when it never existed
    pub fn remove_session(&mut self, session: SessionId) -> bool {
        self.fields.remove(&session).is_some()
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.fields.contains_key(&session)
    }

    /// Battlefield for a session; panics on an unknown id
    pub fn field(&self, session: SessionId) -> &Battlefield {
        match self.fields.get(&session) {
            Some(field) => field,
            None => panic!("no battlefield for session {:?}", session),
        }
    }

    /// Mutable battlefield for a session; panics on an unknown id
    pub fn field_mut(&mut self, session: SessionId) -> &mut Battlefield {
        match self.fields.get_mut(&session) {
            Some(field) => field,
            None => panic!("no battlefield for session {:?}", session),
        }
    }

    // ===== TILE STATE =====

    pub fn occupy(&mut self, session: SessionId, pos: GridPos, unit: UnitId) -> bool {
        self.field_mut(session).occupy(pos, unit)
    }

    pub fn vacate(&mut self, session: SessionId, pos: GridPos) -> bool {
        self.field_mut(session).vacate(pos)
    }

    pub fn set_terrain(&mut self, session: SessionId, pos: GridPos, terrain: Terrain) -> bool {
        self.field_mut(session).set_terrain(pos, terrain)
    }

    pub fn set_height(&mut self, session: SessionId, pos: GridPos, height: f32) -> bool {
        self.field_mut(session).set_height(pos, height)
    }

    pub fn mark_objective(&mut self, session: SessionId, pos: GridPos) -> bool {
        self.field_mut(session).mark_objective(pos)
    }

    pub fn is_passable(&self, session: SessionId, pos: GridPos, ignore_occupants: bool) -> bool {
        self.field(session).is_passable(pos, ignore_occupants, false)
    }

    pub fn snapshot(&self, session: SessionId) -> BattlefieldSnapshot {
        self.field(session).snapshot()
    }

    // ===== MOVEMENT QUERIES =====

    /// Cheapest path between two tiles, served from the session cache when
    /// the same query was answered since the last grid change
    pub fn find_path(
        &mut self,
        session: SessionId,
        start: GridPos,
        goal: GridPos,
        ignore_occupants: bool,
        max_range: Option<f32>,
    ) -> Vec<GridPos> {
        let mut query = PathQuery::new(start, goal);
        query.ignore_occupants = ignore_occupants;
        query.max_range = max_range;
        self.plan_path(session, &query)
    }

    /// Cache-aware pathfinding with the full query surface
    pub fn plan_path(&mut self, session: SessionId, query: &PathQuery) -> Vec<GridPos> {
        let field = self.field_mut(session);
        let key = query.key();

        if let Some(path) = field.cached_path(&key) {
            return path;
        }

        let path = astar::find_path(field, query);
        field.store_path(key, path.clone());
        path
    }

    /// Tiles a movement budget can reach (4-connected, cost-ordered)
    pub fn reachable_tiles(
        &self,
        session: SessionId,
        start: GridPos,
        max_movement: f32,
        ignore_occupants: bool,
    ) -> Vec<GridPos> {
        reachable::reachable_tiles(self.field(session), start, max_movement, ignore_occupants, false)
    }

    pub fn line_of_sight(&self, session: SessionId, from: GridPos, to: GridPos) -> bool {
        los::line_of_sight(self.field(session), from, to)
    }

    // ===== AREA QUERIES =====

    pub fn tiles_in_range(
        &self,
        session: SessionId,
        center: GridPos,
        radius: f32,
        metric: DistanceMetric,
    ) -> Vec<GridPos> {
        area::tiles_in_range(self.field(session), center, radius, metric)
    }

    pub fn apply_area_effect(
        &mut self,
        session: SessionId,
        center: GridPos,
        radius: f32,
        tag: &str,
        pattern: EffectPattern,
    ) -> usize {
        area::apply_area_effect(self.field_mut(session), center, radius, tag, pattern)
    }

    pub fn highlight_tiles(&mut self, session: SessionId, tiles: &[GridPos], tag: &str) -> usize {
        area::highlight_tiles(self.field_mut(session), tiles, tag)
    }

    pub fn clear_highlights(&mut self, session: SessionId) {
        self.field_mut(session).clear_highlights();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_and_remove() {
        let mut grid = SpatialGrid::new();
        let session = SessionId::new();

        grid.initialize(session, 8, 8);
        assert!(grid.contains(session));
        assert!(grid.remove_session(session));
        assert!(!grid.remove_session(session));
    }

    #[test]
    #[should_panic(expected = "no battlefield for session")]
    fn test_unknown_session_panics() {
        let grid = SpatialGrid::new();
        grid.field(SessionId::new());
    }

    #[test]
    fn test_path_is_cached_until_grid_changes() {
        let mut grid = SpatialGrid::new();
        let session = SessionId::new();
        grid.initialize(session, 10, 10);

        let start = GridPos::new(0, 0);
        let goal = GridPos::new(5, 0);

        let first = grid.find_path(session, start, goal, false, None);
        assert_eq!(grid.field(session).cached_path_count(), 1);

        let second = grid.find_path(session, start, goal, false, None);
        assert_eq!(first, second);
        assert_eq!(grid.field(session).cached_path_count(), 1);

        grid.set_terrain(session, GridPos::new(2, 0), Terrain::Walls);
        assert_eq!(grid.field(session).cached_path_count(), 0);

        let rerouted = grid.find_path(session, start, goal, false, None);
        assert!(!rerouted.contains(&GridPos::new(2, 0)));
    }

    #[test]
    fn test_query_options_do_not_alias_in_cache() {
        let mut grid = SpatialGrid::new();
        let session = SessionId::new();
        grid.initialize(session, 6, 1);
        grid.occupy(session, GridPos::new(3, 0), UnitId::new());

        let blocked = grid.find_path(session, GridPos::new(0, 0), GridPos::new(5, 0), false, None);
        let through = grid.find_path(session, GridPos::new(0, 0), GridPos::new(5, 0), true, None);

        assert!(blocked.is_empty());
        assert_eq!(through.len(), 6);
    }

    #[test]
    fn test_area_effect_through_manager() {
        let mut grid = SpatialGrid::new();
        let session = SessionId::new();
        grid.initialize(session, 9, 9);

        let touched =
            grid.apply_area_effect(session, GridPos::new(4, 4), 1.0, "smoke", EffectPattern::Square);
        assert_eq!(touched, 9);
    }

    #[test]
    fn test_highlight_and_clear() {
        let mut grid = SpatialGrid::new();
        let session = SessionId::new();
        grid.initialize(session, 5, 5);

        let tiles = grid.reachable_tiles(session, GridPos::new(2, 2), 1.0, false);
        grid.highlight_tiles(session, &tiles, "move_range");
        assert!(grid
            .field(session)
            .tile(GridPos::new(2, 1))
            .unwrap()
            .highlight
            .is_some());

        grid.clear_highlights(session);
        assert!(grid
            .field(session)
            .tile(GridPos::new(2, 1))
            .unwrap()
            .highlight
            .is_none());
    }
}
