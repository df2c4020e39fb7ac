//! Units and per-session rosters
//!
//! Combat resolution lives outside the engine; units here carry only
//! what movement, targeting, and victory evaluation need.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, Team, UnitId};
use crate::grid::position::GridPos;

/// Fixed combat profile of a unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub max_health: i32,
    pub attack: i32,
    pub defense: i32,
    /// Movement budget per turn, spent against terrain costs
    pub movement_range: f32,
    /// Attack reach in Manhattan tiles
    pub attack_range: i32,
    pub flying: bool,
}

impl Default for UnitStats {
    fn default() -> Self {
        Self {
            max_health: 10,
            attack: 3,
            defense: 1,
            movement_range: 4.0,
            attack_range: 1,
            flying: false,
        }
    }
}

/// A deployed unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub owner: PlayerId,
    pub team: Team,
    pub stats: UnitStats,

    // Position
    pub position: GridPos,

    // State
    pub health: i32,
    pub has_moved: bool,
    pub has_acted: bool,
}

impl Unit {
    pub fn new(owner: PlayerId, team: Team, position: GridPos, stats: UnitStats) -> Self {
        Self {
            id: UnitId::new(),
            owner,
            team,
            stats,
            position,
            health: stats.max_health,
            has_moved: false,
            has_acted: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Nothing left to do this turn
    pub fn is_done(&self) -> bool {
        self.has_moved && self.has_acted
    }

    pub fn reset_turn_flags(&mut self) {
        self.has_moved = false;
        self.has_acted = false;
    }
}

/// All units of one session
#[derive(Debug, Clone, Default)]
pub struct UnitRoster {
    units: AHashMap<UnitId, Unit>,
}

impl UnitRoster {
    pub fn insert(&mut self, unit: Unit) {
        self.units.insert(unit.id, unit);
    }

    pub fn remove(&mut self, unit: UnitId) -> Option<Unit> {
        self.units.remove(&unit)
    }

    pub fn get(&self, unit: UnitId) -> Option<&Unit> {
        self.units.get(&unit)
    }

    pub fn get_mut(&mut self, unit: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&unit)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.units.values_mut()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Living unit standing on a position
    pub fn at(&self, position: GridPos) -> Option<&Unit> {
        self.units
            .values()
            .find(|u| u.is_alive() && u.position == position)
    }

    pub fn living_of_team(&self, team: Team) -> usize {
        self.units
            .values()
            .filter(|u| u.team == team && u.is_alive())
            .count()
    }

    pub fn owned_by(&self, owner: PlayerId) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |u| u.owner == owner)
    }
}
