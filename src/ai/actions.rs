//! Legal action enumeration for AI-controlled units

use crate::ai::protocol::AiAction;
use crate::engine::units::{Unit, UnitRoster};
use crate::grid::battlefield::Battlefield;
use crate::grid::position::DistanceMetric;
use crate::path::{los, reachable};

/// Everything `unit` may legally do right now.
///
/// Moves come from flood-fill reachability, attacks need an enemy in
/// Manhattan range with line of sight, and `Wait` is always on the
/// table so a decision can never come back empty-handed.
pub fn legal_actions(field: &Battlefield, roster: &UnitRoster, unit: &Unit) -> Vec<AiAction> {
    let mut actions = Vec::new();

    if !unit.has_moved {
        for target_position in reachable::reachable_tiles(
            field,
            unit.position,
            unit.stats.movement_range,
            false,
            unit.stats.flying,
        ) {
            actions.push(AiAction::Move { target_position });
        }
    }

    if !unit.has_acted {
        for enemy in roster
            .iter()
            .filter(|u| u.team != unit.team && u.is_alive())
        {
            let distance = unit
                .position
                .distance(&enemy.position, DistanceMetric::Manhattan);
            if distance <= unit.stats.attack_range as f32
                && los::line_of_sight(field, unit.position, enemy.position)
            {
                actions.push(AiAction::Attack {
                    target_id: enemy.id,
                });
            }
        }
    }

    actions.push(AiAction::Wait);
    actions
}
