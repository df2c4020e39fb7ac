//! Per-player session state

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, Team};

/// One player's standing within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub team: Team,
    /// Inactive players are skipped in turn order (disconnects, forfeits)
    pub active: bool,
    /// Decisions come from the AI service instead of a human
    pub is_ai: bool,
    /// Acted this turn (sequential) or this round (simultaneous)
    pub has_acted: bool,
    pub units_alive: usize,
    pub units_total: usize,
    /// Mirror of the turn clock while this player is up
    pub time_remaining: Option<Duration>,
}

impl PlayerState {
    pub fn new(team: Team, is_ai: bool) -> Self {
        Self {
            id: PlayerId::new(),
            team,
            active: true,
            is_ai,
            has_acted: false,
            units_alive: 0,
            units_total: 0,
            time_remaining: None,
        }
    }
}
