//! Wire protocol for the remote decision service
//!
//! One envelope per direction, tagged with `type` so either side can
//! route on the first field. Everything is plain JSON over the
//! transport; nothing here touches engine state.

use serde::{Deserialize, Serialize};

use crate::ai::snapshot::GameSnapshot;
use crate::core::types::{RequestId, SessionId, UnitId};
use crate::grid::position::GridPos;

/// One action a unit is allowed to take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum AiAction {
    Move {
        target_position: GridPos,
    },
    Attack {
        target_id: UnitId,
    },
    Ability {
        ability: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_position: Option<GridPos>,
    },
    Wait,
}

/// Ask the service to pick one of `available_actions` for a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub unit_id: UnitId,
    pub game_state: GameSnapshot,
    pub available_actions: Vec<AiAction>,
    /// Seconds since the Unix epoch at issue time
    pub timestamp: u64,
}

/// The service's pick for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub request_id: RequestId,
    pub decision: AiAction,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Engine-to-service messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceRequest {
    RequestDecision(DecisionRequest),
    Ping,
}

/// Service-to-engine messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceReply {
    DecisionResponse(DecisionResponse),
}
