//! Game and turn state machines: phases, turn bookkeeping, final reports

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, Team, UnitId};
use crate::grid::position::GridPos;

/// Lifecycle phase of a whole session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Players joining, conditions being configured
    #[default]
    Setup,
    /// Units being placed
    Deployment,
    /// Turns running
    Active,
    Paused,
    Ended,
    /// Broken invariant; the session is no longer playable
    Error,
}

/// Advisory sub-phase within one turn (UI hint, never enforced)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Start,
    Movement,
    Action,
    End,
}

/// How players take their turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnMode {
    /// One player at a time, join order
    #[default]
    Sequential,
    /// Everyone acts, then the round advances together
    Simultaneous,
}

/// Why a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    /// One team left standing (or none)
    Elimination,
    ObjectivesCaptured,
    /// Survival turn count reached
    Survival,
    /// Escorted unit died; its owner loses
    EscortLost,
    /// Defended position held long enough
    PositionHeld,
    /// Defended position fell
    PositionTaken,
    /// Session turn limit reached with no winner
    TurnLimit,
    /// Session wall-clock limit reached with no winner
    TimeLimit,
    NoActivePlayers,
    /// Host ended the session
    Manual,
}

/// One recorded action within a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnAction {
    pub player: PlayerId,
    pub kind: TurnActionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TurnActionKind {
    Move {
        unit: UnitId,
        from: GridPos,
        to: GridPos,
    },
    Attack {
        attacker: UnitId,
        target: UnitId,
    },
    Ability {
        unit: UnitId,
        ability: String,
    },
    Wait {
        unit: UnitId,
    },
    /// Turn ended without the unit acting (timeout, AI failure)
    Forfeit {
        unit: UnitId,
    },
}

/// Live state of the current turn
#[derive(Debug, Clone)]
pub struct TurnState {
    /// Starts at 1, increments when the order wraps (sequential) or the
    /// round completes (simultaneous)
    pub turn_number: u32,
    pub phase: TurnPhase,
    pub current_player: PlayerId,
    pub started_at: Instant,
    pub time_limit: Option<Duration>,
    /// Actions taken this turn, in order
    pub actions: Vec<TurnAction>,
}

impl TurnState {
    pub fn new(current_player: PlayerId, now: Instant, time_limit: Option<Duration>) -> Self {
        Self {
            turn_number: 1,
            phase: TurnPhase::Start,
            current_player,
            started_at: now,
            time_limit,
            actions: Vec::new(),
        }
    }

    /// Clock left on this turn; None when untimed
    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        self.time_limit
            .map(|limit| limit.saturating_sub(now.saturating_duration_since(self.started_at)))
    }

    /// Has the turn clock run out?
    pub fn expired(&self, now: Instant) -> bool {
        match self.time_limit {
            Some(limit) => now.saturating_duration_since(self.started_at) >= limit,
            None => false,
        }
    }
}

/// Turn duration accounting
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnMetrics {
    pub completed_turns: u32,
    pub total_turn_time: Duration,
    pub longest_turn: Duration,
}

impl TurnMetrics {
    pub fn record(&mut self, duration: Duration) {
        self.completed_turns += 1;
        self.total_turn_time += duration;
        if duration > self.longest_turn {
            self.longest_turn = duration;
        }
    }

    pub fn average(&self) -> Duration {
        if self.completed_turns == 0 {
            Duration::ZERO
        } else {
            self.total_turn_time / self.completed_turns
        }
    }
}

/// Frozen summary produced when a game ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameReport {
    pub total_turns: u32,
    pub average_turn: Duration,
    pub longest_turn: Duration,
    pub total_time: Duration,
    pub winner: Option<Team>,
    pub reason: GameOverReason,
}

/// Wire form of the running turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnInfo {
    pub current_player: PlayerId,
    pub turn_number: u32,
    pub time_remaining: Option<Duration>,
}
