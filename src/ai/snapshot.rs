//! Serializable view of a session for the decision service

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, SessionId, Team, UnitId};
use crate::engine::units::{Unit, UnitRoster};
use crate::grid::battlefield::{Battlefield, BattlefieldSnapshot};
use crate::grid::position::GridPos;
use crate::turn::state::TurnInfo;

/// One unit as the service sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub owner: PlayerId,
    pub team: Team,
    pub position: GridPos,
    pub health: i32,
    pub max_health: i32,
    pub movement_range: f32,
    pub attack_range: i32,
    pub flying: bool,
    pub has_moved: bool,
    pub has_acted: bool,
}

impl From<&Unit> for UnitSnapshot {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id,
            owner: unit.owner,
            team: unit.team,
            position: unit.position,
            health: unit.health,
            max_health: unit.stats.max_health,
            movement_range: unit.stats.movement_range,
            attack_range: unit.stats.attack_range,
            flying: unit.stats.flying,
            has_moved: unit.has_moved,
            has_acted: unit.has_acted,
        }
    }
}

/// Full game state shipped with every decision request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub session_id: SessionId,
    pub battlefield: BattlefieldSnapshot,
    pub units: Vec<UnitSnapshot>,
    pub turn: TurnInfo,
}

impl GameSnapshot {
    /// Capture the state a decision has to be made against. Dead units
    /// are omitted.
    pub fn capture(
        session: SessionId,
        field: &Battlefield,
        roster: &UnitRoster,
        turn: TurnInfo,
    ) -> Self {
        Self {
            session_id: session,
            battlefield: field.snapshot(),
            units: roster
                .iter()
                .filter(|u| u.is_alive())
                .map(UnitSnapshot::from)
                .collect(),
            turn,
        }
    }
}
