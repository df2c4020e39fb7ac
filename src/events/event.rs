//! Engine events: typed payloads with priority and identity

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::types::{EventId, PlayerId, RequestId, SessionId, Team, UnitId};
use crate::grid::position::GridPos;
use crate::turn::state::{GameOverReason, GamePhase};

/// Dispatch priority, most urgent first
///
/// The derived ordering is the dispatch ordering: earlier variants drain
/// before later ones, and Immediate never waits in the queue at all.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    Immediate,
    High,
    #[default]
    Normal,
    Low,
    Deferred,
}

/// Flat event classification used for subscriptions
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TurnStarted,
    TurnEnded,
    PhaseChanged,
    GameEnded,
    UnitSpawned,
    UnitMoved,
    AttackRequested,
    AbilityRequested,
    DecisionRequested,
    DecisionApplied,
    AiTimeout,
    AiError,
}

/// What happened, with everything a subscriber needs to react
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    TurnStarted {
        session: SessionId,
        player: PlayerId,
        turn: u32,
    },
    TurnEnded {
        session: SessionId,
        player: PlayerId,
        turn: u32,
        duration: Duration,
    },
    PhaseChanged {
        session: SessionId,
        from: GamePhase,
        to: GamePhase,
    },
    GameEnded {
        session: SessionId,
        winner: Option<Team>,
        reason: GameOverReason,
    },
    UnitSpawned {
        session: SessionId,
        unit: UnitId,
        position: GridPos,
    },
    UnitMoved {
        session: SessionId,
        unit: UnitId,
        from: GridPos,
        to: GridPos,
    },
    AttackRequested {
        session: SessionId,
        attacker: UnitId,
        target: UnitId,
    },
    AbilityRequested {
        session: SessionId,
        unit: UnitId,
        ability: String,
        target: Option<GridPos>,
    },
    DecisionRequested {
        session: SessionId,
        request: RequestId,
        unit: UnitId,
    },
    DecisionApplied {
        session: SessionId,
        request: RequestId,
        unit: UnitId,
        latency: Duration,
    },
    AiTimeout {
        session: SessionId,
        request: RequestId,
        unit: UnitId,
    },
    AiError {
        session: SessionId,
        request: Option<RequestId>,
        unit: Option<UnitId>,
        message: String,
    },
}

impl EventPayload {
    /// Kind used to route this payload to subscribers
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::TurnStarted { .. } => EventKind::TurnStarted,
            EventPayload::TurnEnded { .. } => EventKind::TurnEnded,
            EventPayload::PhaseChanged { .. } => EventKind::PhaseChanged,
            EventPayload::GameEnded { .. } => EventKind::GameEnded,
            EventPayload::UnitSpawned { .. } => EventKind::UnitSpawned,
            EventPayload::UnitMoved { .. } => EventKind::UnitMoved,
            EventPayload::AttackRequested { .. } => EventKind::AttackRequested,
            EventPayload::AbilityRequested { .. } => EventKind::AbilityRequested,
            EventPayload::DecisionRequested { .. } => EventKind::DecisionRequested,
            EventPayload::DecisionApplied { .. } => EventKind::DecisionApplied,
            EventPayload::AiTimeout { .. } => EventKind::AiTimeout,
            EventPayload::AiError { .. } => EventKind::AiError,
        }
    }

    /// Session the payload belongs to
    pub fn session(&self) -> SessionId {
        match self {
            EventPayload::TurnStarted { session, .. }
            | EventPayload::TurnEnded { session, .. }
            | EventPayload::PhaseChanged { session, .. }
            | EventPayload::GameEnded { session, .. }
            | EventPayload::UnitSpawned { session, .. }
            | EventPayload::UnitMoved { session, .. }
            | EventPayload::AttackRequested { session, .. }
            | EventPayload::AbilityRequested { session, .. }
            | EventPayload::DecisionRequested { session, .. }
            | EventPayload::DecisionApplied { session, .. }
            | EventPayload::AiTimeout { session, .. }
            | EventPayload::AiError { session, .. } => *session,
        }
    }
}

/// A published event
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub priority: EventPriority,
    pub payload: EventPayload,
    pub created_at: Instant,
    /// Set once dispatch to subscribers has completed
    pub handled: bool,
}

impl Event {
    pub fn new(priority: EventPriority, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            priority,
            payload,
            created_at: Instant::now(),
            handled: false,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering_matches_urgency() {
        assert!(EventPriority::Immediate < EventPriority::High);
        assert!(EventPriority::High < EventPriority::Normal);
        assert!(EventPriority::Normal < EventPriority::Low);
        assert!(EventPriority::Low < EventPriority::Deferred);
    }

    #[test]
    fn test_kind_derivation() {
        let payload = EventPayload::UnitMoved {
            session: SessionId::new(),
            unit: UnitId::new(),
            from: GridPos::new(0, 0),
            to: GridPos::new(1, 0),
        };
        assert_eq!(payload.kind(), EventKind::UnitMoved);
    }

    #[test]
    fn test_payload_serializes_with_type_tag() {
        let payload = EventPayload::AiTimeout {
            session: SessionId::new(),
            request: RequestId::new(),
            unit: UnitId::new(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "ai_timeout");
    }
}
