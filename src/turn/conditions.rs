//! Victory conditions and their evaluation

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::types::{Team, UnitId};
use crate::grid::position::GridPos;
use crate::turn::state::GameOverReason;

/// A way to win, checked in configuration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VictoryCondition {
    /// Last team with living units wins
    EliminateAll,
    /// First team holding this many objectives wins
    CaptureObjectives { required: usize },
    /// Past this turn count, the team with the most living units wins
    SurviveTurns { turns: u32 },
    /// The owner loses the moment the escort dies
    EscortUnit { unit: UnitId, owner: Team },
    /// Defender wins by holding the position this many full turns;
    /// any other team standing on it wins at once
    DefendPosition {
        position: GridPos,
        defender: Team,
        hold_turns: u32,
    },
}

/// Session-wide win/stop rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameConditions {
    /// Checked in order; the first condition to resolve decides the game
    #[serde(default)]
    pub victory: Vec<VictoryCondition>,
    /// Hard stop: the game draws once the turn counter passes this
    #[serde(default)]
    pub turn_limit: Option<u32>,
    /// Hard stop: the game draws once this much play time elapses
    #[serde(default)]
    pub time_limit: Option<Duration>,
}

/// How a finished evaluation came out; `winner` None is a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOutcome {
    pub winner: Option<Team>,
    pub reason: GameOverReason,
}

/// The slice of battle state victory evaluation is allowed to see
///
/// The coordinator never reads rosters or grids directly; the engine hands
/// in this view so the condition logic stays independent of how units are
/// stored.
pub trait VictoryFacts {
    /// Every team present in the session
    fn teams(&self) -> Vec<Team>;
    fn living_units(&self, team: Team) -> usize;
    fn objectives_held(&self, team: Team) -> usize;
    fn unit_alive(&self, unit: UnitId) -> bool;
    /// Team of the unit standing on a position, if any
    fn holder_of(&self, pos: GridPos) -> Option<Team>;
}

/// Evaluate every rule; None means the game continues
pub fn evaluate(
    conditions: &GameConditions,
    facts: &dyn VictoryFacts,
    turn_number: u32,
    elapsed: Duration,
) -> Option<GameOutcome> {
    for condition in &conditions.victory {
        if let Some(outcome) = evaluate_condition(condition, facts, turn_number) {
            return Some(outcome);
        }
    }

    if let Some(limit) = conditions.turn_limit {
        if turn_number > limit {
            return Some(GameOutcome {
                winner: None,
                reason: GameOverReason::TurnLimit,
            });
        }
    }

    if let Some(limit) = conditions.time_limit {
        if elapsed >= limit {
            return Some(GameOutcome {
                winner: None,
                reason: GameOverReason::TimeLimit,
            });
        }
    }

    None
}

fn evaluate_condition(
    condition: &VictoryCondition,
    facts: &dyn VictoryFacts,
    turn_number: u32,
) -> Option<GameOutcome> {
    match condition {
        VictoryCondition::EliminateAll => {
            let teams = facts.teams();
            let alive: Vec<Team> = teams
                .iter()
                .copied()
                .filter(|t| facts.living_units(*t) > 0)
                .collect();

            match alive.as_slice() {
                [] => Some(GameOutcome {
                    winner: None,
                    reason: GameOverReason::Elimination,
                }),
                [last] if teams.len() > 1 => Some(GameOutcome {
                    winner: Some(*last),
                    reason: GameOverReason::Elimination,
                }),
                _ => None,
            }
        }

        VictoryCondition::CaptureObjectives { required } => facts
            .teams()
            .into_iter()
            .find(|t| facts.objectives_held(*t) >= *required)
            .map(|winner| GameOutcome {
                winner: Some(winner),
                reason: GameOverReason::ObjectivesCaptured,
            }),

        VictoryCondition::SurviveTurns { turns } => {
            if turn_number <= *turns {
                return None;
            }
            // Most living units takes it; ties and empty fields draw
            let mut best: Option<(Team, usize)> = None;
            let mut tied = false;
            for team in facts.teams() {
                let count = facts.living_units(team);
                match best {
                    Some((_, top)) if count > top => {
                        best = Some((team, count));
                        tied = false;
                    }
                    Some((_, top)) if count == top => tied = true,
                    None => best = Some((team, count)),
                    _ => {}
                }
            }
            let winner = match best {
                Some((team, count)) if count > 0 && !tied => Some(team),
                _ => None,
            };
            Some(GameOutcome {
                winner,
                reason: GameOverReason::Survival,
            })
        }

        VictoryCondition::EscortUnit { unit, owner } => {
            if facts.unit_alive(*unit) {
                return None;
            }
            let others: Vec<Team> = facts
                .teams()
                .into_iter()
                .filter(|t| *t != *owner && facts.living_units(*t) > 0)
                .collect();
            Some(GameOutcome {
                winner: match others.as_slice() {
                    [sole] => Some(*sole),
                    _ => None,
                },
                reason: GameOverReason::EscortLost,
            })
        }

        VictoryCondition::DefendPosition {
            position,
            defender,
            hold_turns,
        } => {
            if let Some(holder) = facts.holder_of(*position) {
                if holder != *defender {
                    return Some(GameOutcome {
                        winner: Some(holder),
                        reason: GameOverReason::PositionTaken,
                    });
                }
            }
            if turn_number > *hold_turns {
                Some(GameOutcome {
                    winner: Some(*defender),
                    reason: GameOverReason::PositionHeld,
                })
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;

    /// Hand-rolled facts for condition tests
    #[derive(Default)]
    struct FakeFacts {
        living: AHashMap<Team, usize>,
        objectives: AHashMap<Team, usize>,
        dead_units: Vec<UnitId>,
        holders: AHashMap<GridPos, Team>,
    }

    impl VictoryFacts for FakeFacts {
        fn teams(&self) -> Vec<Team> {
            let mut teams: Vec<Team> = self.living.keys().copied().collect();
            teams.sort();
            teams
        }
        fn living_units(&self, team: Team) -> usize {
            self.living.get(&team).copied().unwrap_or(0)
        }
        fn objectives_held(&self, team: Team) -> usize {
            self.objectives.get(&team).copied().unwrap_or(0)
        }
        fn unit_alive(&self, unit: UnitId) -> bool {
            !self.dead_units.contains(&unit)
        }
        fn holder_of(&self, pos: GridPos) -> Option<Team> {
            self.holders.get(&pos).copied()
        }
    }

    fn eliminate_only() -> GameConditions {
        GameConditions {
            victory: vec![VictoryCondition::EliminateAll],
            ..Default::default()
        }
    }

    #[test]
    fn test_eliminate_all_sole_survivor_wins() {
        let mut facts = FakeFacts::default();
        facts.living.insert(Team(1), 3);
        facts.living.insert(Team(2), 0);

        let outcome = evaluate(&eliminate_only(), &facts, 5, Duration::ZERO).unwrap();
        assert_eq!(outcome.winner, Some(Team(1)));
        assert_eq!(outcome.reason, GameOverReason::Elimination);
    }

    #[test]
    fn test_eliminate_all_mutual_destruction_draws() {
        let mut facts = FakeFacts::default();
        facts.living.insert(Team(1), 0);
        facts.living.insert(Team(2), 0);

        let outcome = evaluate(&eliminate_only(), &facts, 5, Duration::ZERO).unwrap();
        assert_eq!(outcome.winner, None);
    }

    #[test]
    fn test_eliminate_all_still_contested() {
        let mut facts = FakeFacts::default();
        facts.living.insert(Team(1), 2);
        facts.living.insert(Team(2), 1);

        assert!(evaluate(&eliminate_only(), &facts, 5, Duration::ZERO).is_none());
    }

    #[test]
    fn test_capture_objectives_threshold() {
        let conditions = GameConditions {
            victory: vec![VictoryCondition::CaptureObjectives { required: 2 }],
            ..Default::default()
        };
        let mut facts = FakeFacts::default();
        facts.living.insert(Team(1), 1);
        facts.living.insert(Team(2), 1);
        facts.objectives.insert(Team(2), 1);

        assert!(evaluate(&conditions, &facts, 3, Duration::ZERO).is_none());

        facts.objectives.insert(Team(2), 2);
        let outcome = evaluate(&conditions, &facts, 3, Duration::ZERO).unwrap();
        assert_eq!(outcome.winner, Some(Team(2)));
        assert_eq!(outcome.reason, GameOverReason::ObjectivesCaptured);
    }

    #[test]
    fn test_survive_turns_most_units_wins() {
        let conditions = GameConditions {
            victory: vec![VictoryCondition::SurviveTurns { turns: 10 }],
            ..Default::default()
        };
        let mut facts = FakeFacts::default();
        facts.living.insert(Team(1), 4);
        facts.living.insert(Team(2), 2);

        assert!(evaluate(&conditions, &facts, 10, Duration::ZERO).is_none());

        let outcome = evaluate(&conditions, &facts, 11, Duration::ZERO).unwrap();
        assert_eq!(outcome.winner, Some(Team(1)));
        assert_eq!(outcome.reason, GameOverReason::Survival);
    }

    #[test]
    fn test_survive_turns_tie_draws() {
        let conditions = GameConditions {
            victory: vec![VictoryCondition::SurviveTurns { turns: 5 }],
            ..Default::default()
        };
        let mut facts = FakeFacts::default();
        facts.living.insert(Team(1), 3);
        facts.living.insert(Team(2), 3);

        let outcome = evaluate(&conditions, &facts, 6, Duration::ZERO).unwrap();
        assert_eq!(outcome.winner, None);
    }

    #[test]
    fn test_escort_death_loses_for_owner() {
        let escort = UnitId::new();
        let conditions = GameConditions {
            victory: vec![VictoryCondition::EscortUnit {
                unit: escort,
                owner: Team(1),
            }],
            ..Default::default()
        };
        let mut facts = FakeFacts::default();
        facts.living.insert(Team(1), 3);
        facts.living.insert(Team(2), 2);

        assert!(evaluate(&conditions, &facts, 2, Duration::ZERO).is_none());

        facts.dead_units.push(escort);
        let outcome = evaluate(&conditions, &facts, 2, Duration::ZERO).unwrap();
        assert_eq!(outcome.winner, Some(Team(2)));
        assert_eq!(outcome.reason, GameOverReason::EscortLost);
    }

    #[test]
    fn test_defend_position_both_ways() {
        let spot = GridPos::new(4, 4);
        let conditions = GameConditions {
            victory: vec![VictoryCondition::DefendPosition {
                position: spot,
                defender: Team(1),
                hold_turns: 8,
            }],
            ..Default::default()
        };
        let mut facts = FakeFacts::default();
        facts.living.insert(Team(1), 2);
        facts.living.insert(Team(2), 2);

        // Attacker takes the spot: instant loss
        facts.holders.insert(spot, Team(2));
        let fallen = evaluate(&conditions, &facts, 3, Duration::ZERO).unwrap();
        assert_eq!(fallen.winner, Some(Team(2)));
        assert_eq!(fallen.reason, GameOverReason::PositionTaken);

        // Defender holds past the required turns
        facts.holders.insert(spot, Team(1));
        assert!(evaluate(&conditions, &facts, 8, Duration::ZERO).is_none());
        let held = evaluate(&conditions, &facts, 9, Duration::ZERO).unwrap();
        assert_eq!(held.winner, Some(Team(1)));
        assert_eq!(held.reason, GameOverReason::PositionHeld);
    }

    #[test]
    fn test_conditions_checked_in_order() {
        // Both apply at once; the first configured one decides
        let conditions = GameConditions {
            victory: vec![
                VictoryCondition::CaptureObjectives { required: 1 },
                VictoryCondition::EliminateAll,
            ],
            ..Default::default()
        };
        let mut facts = FakeFacts::default();
        facts.living.insert(Team(1), 1);
        facts.living.insert(Team(2), 0);
        facts.objectives.insert(Team(1), 1);

        let outcome = evaluate(&conditions, &facts, 4, Duration::ZERO).unwrap();
        assert_eq!(outcome.reason, GameOverReason::ObjectivesCaptured);
    }

    #[test]
    fn test_turn_limit_draws() {
        let conditions = GameConditions {
            victory: vec![VictoryCondition::EliminateAll],
            turn_limit: Some(20),
            ..Default::default()
        };
        let mut facts = FakeFacts::default();
        facts.living.insert(Team(1), 1);
        facts.living.insert(Team(2), 1);

        assert!(evaluate(&conditions, &facts, 20, Duration::ZERO).is_none());
        let outcome = evaluate(&conditions, &facts, 21, Duration::ZERO).unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.reason, GameOverReason::TurnLimit);
    }

    #[test]
    fn test_time_limit_draws() {
        let conditions = GameConditions {
            time_limit: Some(Duration::from_secs(600)),
            ..Default::default()
        };
        let facts = FakeFacts::default();

        assert!(evaluate(&conditions, &facts, 1, Duration::from_secs(599)).is_none());
        let outcome = evaluate(&conditions, &facts, 1, Duration::from_secs(600)).unwrap();
        assert_eq!(outcome.reason, GameOverReason::TimeLimit);
    }
}
