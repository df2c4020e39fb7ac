//! Decision request bookkeeping: who is controlled, what is in flight
//!
//! The coordinator owns the pending-request table. Removing an entry via
//! `take_pending` or the timeout sweep is the only way out of it, so a
//! request is applied or timed out exactly once, never both.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ahash::AHashMap;
use serde::Serialize;

use crate::ai::actions::legal_actions;
use crate::ai::protocol::DecisionRequest;
use crate::ai::snapshot::GameSnapshot;
use crate::core::types::{PlayerId, RequestId, SessionId, UnitId};
use crate::engine::units::UnitRoster;
use crate::events::{Event, EventBus, EventPayload, EventPriority};
use crate::grid::battlefield::Battlefield;
use crate::turn::state::TurnInfo;

/// An issued request waiting for its decision
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub request: RequestId,
    pub session: SessionId,
    pub unit: UnitId,
    pub issued_at: Instant,
    pub deadline: Instant,
}

/// Running counters for the decision pipeline
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AiMetrics {
    pub requests_issued: u64,
    pub decisions_applied: u64,
    pub timeouts: u64,
    pub failures: u64,
    #[serde(skip)]
    pub total_latency: Duration,
}

impl AiMetrics {
    pub fn mean_latency(&self) -> Duration {
        if self.decisions_applied == 0 {
            Duration::ZERO
        } else {
            self.total_latency / self.decisions_applied as u32
        }
    }
}

/// Tracks AI-controlled units and their in-flight decision requests
#[derive(Debug)]
pub struct AiCoordinator {
    controlled: AHashMap<SessionId, Vec<UnitId>>,
    pending: AHashMap<RequestId, PendingRequest>,
    metrics: AiMetrics,
    decision_timeout: Duration,
}

impl AiCoordinator {
    pub fn new(decision_timeout: Duration) -> Self {
        Self {
            controlled: AHashMap::new(),
            pending: AHashMap::new(),
            metrics: AiMetrics::default(),
            decision_timeout,
        }
    }

    // ===== REGISTRATION =====

    /// Put a unit under AI control
    pub fn register_unit(&mut self, session: SessionId, unit: UnitId) {
        let units = self.controlled.entry(session).or_default();
        if !units.contains(&unit) {
            units.push(unit);
        }
    }

    /// Release a unit; its in-flight request (if any) is dropped too
    pub fn unregister_unit(&mut self, session: SessionId, unit: UnitId) -> bool {
        self.pending.retain(|_, p| p.unit != unit);
        match self.controlled.get_mut(&session) {
            Some(units) => {
                let before = units.len();
                units.retain(|&u| u != unit);
                units.len() != before
            }
            None => false,
        }
    }

    /// Forget a whole session, pending requests included
    pub fn remove_session(&mut self, session: SessionId) {
        self.controlled.remove(&session);
        self.pending.retain(|_, p| p.session != session);
    }

    pub fn is_controlled(&self, session: SessionId, unit: UnitId) -> bool {
        self.controlled
            .get(&session)
            .map(|units| units.contains(&unit))
            .unwrap_or(false)
    }

    // ===== REQUEST FLOW =====

    /// Issue decision requests for `player`'s controlled units.
    ///
    /// Units that are dead, already done this turn, or still waiting on
    /// an earlier request are skipped. Each issued request lands in the
    /// pending table and is announced on the bus.
    #[allow(clippy::too_many_arguments)]
    pub fn request_decisions(
        &mut self,
        session: SessionId,
        player: PlayerId,
        field: &Battlefield,
        roster: &UnitRoster,
        turn: TurnInfo,
        now: Instant,
        bus: &mut EventBus,
    ) -> Vec<DecisionRequest> {
        let Some(controlled) = self.controlled.get(&session) else {
            return Vec::new();
        };

        let snapshot = GameSnapshot::capture(session, field, roster, turn);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut requests = Vec::new();
        for &unit_id in controlled {
            let Some(unit) = roster.get(unit_id) else {
                continue;
            };
            if unit.owner != player || !unit.is_alive() || unit.is_done() {
                continue;
            }
            if self.pending.values().any(|p| p.unit == unit_id) {
                continue;
            }

            let request = RequestId::new();
            self.pending.insert(
                request,
                PendingRequest {
                    request,
                    session,
                    unit: unit_id,
                    issued_at: now,
                    deadline: now + self.decision_timeout,
                },
            );
            bus.publish(Event::new(
                EventPriority::High,
                EventPayload::DecisionRequested {
                    session,
                    request,
                    unit: unit_id,
                },
            ));
            requests.push(DecisionRequest {
                request_id: request,
                session_id: session,
                unit_id,
                game_state: snapshot.clone(),
                available_actions: legal_actions(field, roster, unit),
                timestamp,
            });
        }

        self.metrics.requests_issued += requests.len() as u64;
        if !requests.is_empty() {
            tracing::debug!(?session, count = requests.len(), "decision requests issued");
        }
        requests
    }

    /// Claim a pending request. None means it already timed out, was
    /// already applied, or never existed; the caller ignores the
    /// decision in every one of those cases.
    pub fn take_pending(&mut self, request: RequestId) -> Option<PendingRequest> {
        self.pending.remove(&request)
    }

    /// Expire overdue requests. Each expired entry comes back exactly
    /// once, paired with one `AiTimeout` event.
    pub fn sweep_timeouts(&mut self, now: Instant, bus: &mut EventBus) -> Vec<PendingRequest> {
        let overdue: Vec<RequestId> = self
            .pending
            .values()
            .filter(|p| p.deadline <= now)
            .map(|p| p.request)
            .collect();

        let mut expired = Vec::with_capacity(overdue.len());
        for request in overdue {
            if let Some(pending) = self.pending.remove(&request) {
                tracing::warn!(
                    session = ?pending.session,
                    unit = ?pending.unit,
                    "decision request timed out"
                );
                bus.publish(Event::new(
                    EventPriority::High,
                    EventPayload::AiTimeout {
                        session: pending.session,
                        request: pending.request,
                        unit: pending.unit,
                    },
                ));
                self.metrics.timeouts += 1;
                expired.push(pending);
            }
        }
        expired
    }

    /// Units of a session still waiting on a decision
    pub fn pending_units(&self, session: SessionId) -> Vec<UnitId> {
        self.pending
            .values()
            .filter(|p| p.session == session)
            .map(|p| p.unit)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ===== METRICS =====

    pub fn record_applied(&mut self, latency: Duration) {
        self.metrics.decisions_applied += 1;
        self.metrics.total_latency += latency;
    }

    pub fn record_failure(&mut self) {
        self.metrics.failures += 1;
    }

    pub fn metrics(&self) -> &AiMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::protocol::AiAction;
    use crate::core::types::Team;
    use crate::engine::units::{Unit, UnitStats};
    use crate::grid::position::GridPos;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn arena() -> (
        AiCoordinator,
        EventBus,
        SessionId,
        PlayerId,
        Battlefield,
        UnitRoster,
        UnitId,
    ) {
        let mut field = Battlefield::new(6, 6);
        let mut roster = UnitRoster::default();
        let session = SessionId::new();
        let player = PlayerId::new();

        let unit = Unit::new(player, Team(1), GridPos::new(2, 2), UnitStats::default());
        let id = unit.id;
        assert!(field.occupy(GridPos::new(2, 2), id));
        roster.insert(unit);

        let mut ai = AiCoordinator::new(TIMEOUT);
        ai.register_unit(session, id);
        (ai, EventBus::new(), session, player, field, roster, id)
    }

    fn info(player: PlayerId) -> TurnInfo {
        TurnInfo {
            current_player: player,
            turn_number: 1,
            time_remaining: None,
        }
    }

    #[test]
    fn test_request_carries_legal_actions_and_snapshot() {
        let (mut ai, mut bus, session, player, field, roster, unit) = arena();
        let now = Instant::now();

        let requests =
            ai.request_decisions(session, player, &field, &roster, info(player), now, &mut bus);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].unit_id, unit);
        assert!(requests[0].available_actions.contains(&AiAction::Wait));
        assert_eq!(requests[0].game_state.units.len(), 1);
        assert_eq!(ai.pending_count(), 1);
        assert_eq!(ai.metrics().requests_issued, 1);
    }

    #[test]
    fn test_in_flight_unit_is_not_asked_again() {
        let (mut ai, mut bus, session, player, field, roster, _unit) = arena();
        let now = Instant::now();

        ai.request_decisions(session, player, &field, &roster, info(player), now, &mut bus);
        let again =
            ai.request_decisions(session, player, &field, &roster, info(player), now, &mut bus);
        assert!(again.is_empty());
        assert_eq!(ai.pending_count(), 1);
    }

    #[test]
    fn test_take_pending_is_exactly_once() {
        let (mut ai, mut bus, session, player, field, roster, _unit) = arena();
        let now = Instant::now();

        let requests =
            ai.request_decisions(session, player, &field, &roster, info(player), now, &mut bus);
        let id = requests[0].request_id;

        assert!(ai.take_pending(id).is_some());
        assert!(ai.take_pending(id).is_none());
    }

    #[test]
    fn test_sweep_expires_and_never_repeats() {
        let (mut ai, mut bus, session, player, field, roster, unit) = arena();
        let now = Instant::now();

        ai.request_decisions(session, player, &field, &roster, info(player), now, &mut bus);

        let fresh = ai.sweep_timeouts(now + Duration::from_secs(29), &mut bus);
        assert!(fresh.is_empty());

        let expired = ai.sweep_timeouts(now + TIMEOUT, &mut bus);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].unit, unit);
        assert_eq!(ai.metrics().timeouts, 1);

        // a second sweep finds nothing; the request is gone for good
        assert!(ai.sweep_timeouts(now + TIMEOUT, &mut bus).is_empty());
        assert_eq!(ai.pending_count(), 0);
    }

    #[test]
    fn test_timed_out_request_cannot_be_applied() {
        let (mut ai, mut bus, session, player, field, roster, _unit) = arena();
        let now = Instant::now();

        let requests =
            ai.request_decisions(session, player, &field, &roster, info(player), now, &mut bus);
        ai.sweep_timeouts(now + TIMEOUT, &mut bus);

        assert!(ai.take_pending(requests[0].request_id).is_none());
    }

    #[test]
    fn test_done_units_are_skipped() {
        let (mut ai, mut bus, session, player, field, mut roster, unit) = arena();
        let now = Instant::now();
        if let Some(u) = roster.get_mut(unit) {
            u.has_moved = true;
            u.has_acted = true;
        }

        let requests =
            ai.request_decisions(session, player, &field, &roster, info(player), now, &mut bus);
        assert!(requests.is_empty());
    }

    #[test]
    fn test_unregister_drops_pending() {
        let (mut ai, mut bus, session, player, field, roster, unit) = arena();
        let now = Instant::now();

        ai.request_decisions(session, player, &field, &roster, info(player), now, &mut bus);
        assert!(ai.unregister_unit(session, unit));
        assert_eq!(ai.pending_count(), 0);
        assert!(!ai.is_controlled(session, unit));
    }

    #[test]
    fn test_mean_latency() {
        let mut ai = AiCoordinator::new(TIMEOUT);
        ai.record_applied(Duration::from_millis(100));
        ai.record_applied(Duration::from_millis(300));
        assert_eq!(ai.metrics().mean_latency(), Duration::from_millis(200));
    }
}
