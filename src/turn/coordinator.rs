//! Session-keyed turn machinery
//!
//! One `TurnCoordinator` drives every live session: game phase, turn
//! order, turn clocks, and victory evaluation. Like the spatial grid,
//! unknown session ids panic; everything a player can get wrong is a
//! `false` return with no state change.

use std::time::{Duration, Instant};

use ahash::AHashMap;

use crate::core::types::{PlayerId, SessionId, Team};
use crate::events::{Event, EventBus, EventPayload, EventPriority};
use crate::turn::conditions::{evaluate, GameConditions, GameOutcome, VictoryFacts};
use crate::turn::player::PlayerState;
use crate::turn::state::{
    GameOverReason, GamePhase, GameReport, TurnAction, TurnInfo, TurnMetrics, TurnMode, TurnPhase,
    TurnState,
};

/// Everything one session's turn flow tracks
#[derive(Debug, Clone)]
struct TurnLedger {
    phase: GamePhase,
    mode: TurnMode,
    conditions: GameConditions,
    /// Join order is turn order
    players: Vec<PlayerState>,
    turn: Option<TurnState>,
    time_limit: Option<Duration>,
    metrics: TurnMetrics,
    game_started_at: Option<Instant>,
    paused_at: Option<Instant>,
    report: Option<GameReport>,
}

/// What a tick found it has to force before victory is checked
enum Forced {
    Nothing,
    NoActivePlayers,
    Advance { player: PlayerId, expired: bool },
    Round(Vec<PlayerId>),
}

/// Registry of per-session turn ledgers
#[derive(Debug, Default)]
pub struct TurnCoordinator {
    sessions: AHashMap<SessionId, TurnLedger>,
}

impl TurnCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) the turn ledger for a session, phase `Setup`
    pub fn create_session(
        &mut self,
        session: SessionId,
        mode: TurnMode,
        conditions: GameConditions,
        time_limit: Option<Duration>,
    ) {
        tracing::debug!(?session, ?mode, "turn ledger created");
        self.sessions.insert(
            session,
            TurnLedger {
                phase: GamePhase::Setup,
                mode,
                conditions,
                players: Vec::new(),
                turn: None,
                time_limit,
                metrics: TurnMetrics::default(),
                game_started_at: None,
                paused_at: None,
                report: None,
            },
        );
    }

    /// Drop a session's ledger; false when it never existed
    pub fn remove_session(&mut self, session: SessionId) -> bool {
        self.sessions.remove(&session).is_some()
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    fn ledger(&self, session: SessionId) -> &TurnLedger {
        match self.sessions.get(&session) {
            Some(ledger) => ledger,
            None => panic!("no turn ledger for session {:?}", session),
        }
    }

    fn ledger_mut(&mut self, session: SessionId) -> &mut TurnLedger {
        match self.sessions.get_mut(&session) {
            Some(ledger) => ledger,
            None => panic!("no turn ledger for session {:?}", session),
        }
    }

    // ===== SETUP =====

    /// Add a player during `Setup`; None once the roster is locked
    pub fn add_player(&mut self, session: SessionId, team: Team, is_ai: bool) -> Option<PlayerId> {
        let ledger = self.ledger_mut(session);
        if ledger.phase != GamePhase::Setup {
            return None;
        }
        let player = PlayerState::new(team, is_ai);
        let id = player.id;
        ledger.players.push(player);
        Some(id)
    }

    /// Mark a player connected or disconnected; false for unknown players
    pub fn set_player_active(&mut self, session: SessionId, player: PlayerId, active: bool) -> bool {
        let ledger = self.ledger_mut(session);
        match ledger.players.iter_mut().find(|p| p.id == player) {
            Some(seat) => {
                seat.active = active;
                true
            }
            None => false,
        }
    }

    /// `Setup -> Deployment`; false from any other phase
    pub fn begin_deployment(&mut self, session: SessionId, bus: &mut EventBus) -> bool {
        let ledger = self.ledger_mut(session);
        if ledger.phase != GamePhase::Setup {
            return false;
        }
        ledger.phase = GamePhase::Deployment;
        bus.publish(Event::new(
            EventPriority::High,
            EventPayload::PhaseChanged {
                session,
                from: GamePhase::Setup,
                to: GamePhase::Deployment,
            },
        ));
        true
    }

    /// Begin play: phase `Active`, turn 1, first active player up.
    /// False when already underway or nobody can take a turn.
    pub fn start_game(&mut self, session: SessionId, now: Instant, bus: &mut EventBus) -> bool {
        let ledger = self.ledger_mut(session);
        if !matches!(ledger.phase, GamePhase::Setup | GamePhase::Deployment) {
            return false;
        }
        let Some(first) = ledger.players.iter().find(|p| p.active).map(|p| p.id) else {
            return false;
        };
        let from = ledger.phase;
        ledger.phase = GamePhase::Active;
        ledger.game_started_at = Some(now);
        ledger.turn = Some(TurnState::new(first, now, ledger.time_limit));
        for seat in ledger.players.iter_mut() {
            seat.has_acted = false;
        }
        tracing::info!(?session, players = ledger.players.len(), "game started");
        bus.publish(Event::new(
            EventPriority::High,
            EventPayload::PhaseChanged {
                session,
                from,
                to: GamePhase::Active,
            },
        ));
        bus.publish(Event::new(
            EventPriority::Normal,
            EventPayload::TurnStarted {
                session,
                player: first,
                turn: 1,
            },
        ));
        true
    }

    // ===== TURN FLOW =====

    /// End `player`'s turn.
    ///
    /// Sequential: only the current player may end; play advances to the
    /// next active seat, and the turn number increments exactly when the
    /// order wraps back to its first entry. Simultaneous: any active
    /// player that has not acted yet may end; the round closes once all
    /// of them have.
    pub fn end_turn(
        &mut self,
        session: SessionId,
        player: PlayerId,
        now: Instant,
        bus: &mut EventBus,
    ) -> bool {
        let mut stalled = false;
        {
            let ledger = self.ledger_mut(session);
            if ledger.phase != GamePhase::Active {
                return false;
            }
            let Some(turn) = ledger.turn.as_mut() else {
                return false;
            };

            match ledger.mode {
                TurnMode::Sequential => {
                    if turn.current_player != player {
                        return false;
                    }
                    let Some(cur_idx) = ledger.players.iter().position(|p| p.id == player) else {
                        return false;
                    };

                    let duration = now.duration_since(turn.started_at);
                    let left = turn.time_remaining(now);
                    ledger.metrics.record(duration);
                    if let Some(seat) = ledger.players.iter_mut().find(|p| p.id == player) {
                        seat.has_acted = true;
                        seat.time_remaining = left;
                    }
                    bus.publish(Event::new(
                        EventPriority::Normal,
                        EventPayload::TurnEnded {
                            session,
                            player,
                            turn: turn.turn_number,
                            duration,
                        },
                    ));

                    let count = ledger.players.len();
                    let next = (1..=count)
                        .map(|offset| (cur_idx + offset) % count)
                        .find(|&idx| ledger.players[idx].active);

                    match next {
                        Some(next_idx) => {
                            // wrapping past the last seat opens the next numbered turn
                            if next_idx <= cur_idx {
                                turn.turn_number += 1;
                                for seat in ledger.players.iter_mut() {
                                    seat.has_acted = false;
                                }
                            }
                            turn.current_player = ledger.players[next_idx].id;
                            turn.started_at = now;
                            turn.phase = TurnPhase::Start;
                            turn.actions.clear();
                            bus.publish(Event::new(
                                EventPriority::Normal,
                                EventPayload::TurnStarted {
                                    session,
                                    player: turn.current_player,
                                    turn: turn.turn_number,
                                },
                            ));
                        }
                        None => stalled = true,
                    }
                }

                TurnMode::Simultaneous => {
                    let left = turn.time_remaining(now);
                    let Some(seat) = ledger.players.iter_mut().find(|p| p.id == player) else {
                        return false;
                    };
                    if !seat.active || seat.has_acted {
                        return false;
                    }
                    seat.has_acted = true;
                    seat.time_remaining = left;
                    bus.publish(Event::new(
                        EventPriority::Normal,
                        EventPayload::TurnEnded {
                            session,
                            player,
                            turn: turn.turn_number,
                            duration: now.duration_since(turn.started_at),
                        },
                    ));

                    let all_acted = ledger
                        .players
                        .iter()
                        .filter(|p| p.active)
                        .all(|p| p.has_acted);
                    if all_acted {
                        ledger.metrics.record(now.duration_since(turn.started_at));
                        turn.turn_number += 1;
                        turn.started_at = now;
                        turn.phase = TurnPhase::Start;
                        turn.actions.clear();
                        for seat in ledger.players.iter_mut().filter(|p| p.active) {
                            seat.has_acted = false;
                        }
                        if let Some(first) = ledger.players.iter().find(|p| p.active) {
                            turn.current_player = first.id;
                        }
                        bus.publish(Event::new(
                            EventPriority::Normal,
                            EventPayload::TurnStarted {
                                session,
                                player: turn.current_player,
                                turn: turn.turn_number,
                            },
                        ));
                    }
                }
            }
        }

        if stalled {
            self.end_game(session, GameOverReason::NoActivePlayers, None, now, bus);
        }
        true
    }

    /// `Active -> Paused`; the turn clock stops counting
    pub fn pause(&mut self, session: SessionId, now: Instant, bus: &mut EventBus) -> bool {
        let ledger = self.ledger_mut(session);
        if ledger.phase != GamePhase::Active {
            return false;
        }
        ledger.phase = GamePhase::Paused;
        ledger.paused_at = Some(now);
        bus.publish(Event::new(
            EventPriority::High,
            EventPayload::PhaseChanged {
                session,
                from: GamePhase::Active,
                to: GamePhase::Paused,
            },
        ));
        true
    }

    /// `Paused -> Active`; the paused span never counts against any clock
    pub fn resume(&mut self, session: SessionId, now: Instant, bus: &mut EventBus) -> bool {
        let ledger = self.ledger_mut(session);
        if ledger.phase != GamePhase::Paused {
            return false;
        }
        let Some(paused_at) = ledger.paused_at.take() else {
            return false;
        };
        let span = now.duration_since(paused_at);
        if let Some(turn) = ledger.turn.as_mut() {
            turn.started_at += span;
        }
        if let Some(start) = ledger.game_started_at.as_mut() {
            *start += span;
        }
        ledger.phase = GamePhase::Active;
        bus.publish(Event::new(
            EventPriority::High,
            EventPayload::PhaseChanged {
                session,
                from: GamePhase::Paused,
                to: GamePhase::Active,
            },
        ));
        true
    }

    /// Tick the session: force expired turns over, then check victory
    pub fn update(
        &mut self,
        session: SessionId,
        facts: &dyn VictoryFacts,
        now: Instant,
        bus: &mut EventBus,
    ) {
        let forced = {
            let ledger = self.ledger_mut(session);
            if ledger.phase != GamePhase::Active {
                return;
            }
            if !ledger.players.iter().any(|p| p.active) {
                Forced::NoActivePlayers
            } else {
                match (ledger.mode, ledger.turn.as_ref()) {
                    (TurnMode::Sequential, Some(turn)) => {
                        let sidelined = ledger
                            .players
                            .iter()
                            .find(|p| p.id == turn.current_player)
                            .map(|p| !p.active)
                            .unwrap_or(true);
                        if turn.expired(now) || sidelined {
                            Forced::Advance {
                                player: turn.current_player,
                                expired: turn.expired(now),
                            }
                        } else {
                            Forced::Nothing
                        }
                    }
                    (TurnMode::Simultaneous, Some(turn)) if turn.expired(now) => Forced::Round(
                        ledger
                            .players
                            .iter()
                            .filter(|p| p.active && !p.has_acted)
                            .map(|p| p.id)
                            .collect(),
                    ),
                    _ => Forced::Nothing,
                }
            }
        };

        match forced {
            Forced::Nothing => {}
            Forced::NoActivePlayers => {
                self.end_game(session, GameOverReason::NoActivePlayers, None, now, bus);
                return;
            }
            Forced::Advance { player, expired } => {
                if expired {
                    tracing::warn!(?session, ?player, "turn clock expired, forcing end of turn");
                } else {
                    tracing::debug!(?session, ?player, "current player inactive, advancing");
                }
                self.end_turn(session, player, now, bus);
            }
            Forced::Round(laggards) => {
                tracing::warn!(
                    ?session,
                    laggards = laggards.len(),
                    "round clock expired, closing out remaining turns"
                );
                for player in laggards {
                    self.end_turn(session, player, now, bus);
                }
            }
        }

        let verdict = {
            let ledger = self.ledger_mut(session);
            if ledger.phase != GamePhase::Active {
                None
            } else {
                let turn_number = ledger.turn.as_ref().map(|t| t.turn_number).unwrap_or(0);
                let elapsed = ledger
                    .game_started_at
                    .map(|start| now.duration_since(start))
                    .unwrap_or_default();
                evaluate(&ledger.conditions, facts, turn_number, elapsed)
            }
        };
        if let Some(GameOutcome { winner, reason }) = verdict {
            self.end_game(session, reason, winner, now, bus);
        }
    }

    /// Finish the game and freeze its report. False once already over.
    pub fn end_game(
        &mut self,
        session: SessionId,
        reason: GameOverReason,
        winner: Option<Team>,
        now: Instant,
        bus: &mut EventBus,
    ) -> bool {
        let ledger = self.ledger_mut(session);
        if ledger.phase == GamePhase::Ended {
            return false;
        }
        let from = ledger.phase;
        let total_time = ledger
            .game_started_at
            .map(|start| now.duration_since(start))
            .unwrap_or_default();
        ledger.report = Some(GameReport {
            total_turns: ledger.turn.as_ref().map(|t| t.turn_number).unwrap_or(0),
            average_turn: ledger.metrics.average(),
            longest_turn: ledger.metrics.longest_turn,
            total_time,
            winner,
            reason,
        });
        ledger.phase = GamePhase::Ended;
        tracing::info!(?session, ?winner, ?reason, "game over");
        bus.publish(Event::new(
            EventPriority::High,
            EventPayload::PhaseChanged {
                session,
                from,
                to: GamePhase::Ended,
            },
        ));
        bus.publish(Event::new(
            EventPriority::Immediate,
            EventPayload::GameEnded {
                session,
                winner,
                reason,
            },
        ));
        true
    }

    /// Drop the session into `Error` from any phase; used when a state
    /// invariant is found broken
    pub fn mark_error(&mut self, session: SessionId, bus: &mut EventBus) {
        let ledger = self.ledger_mut(session);
        if ledger.phase == GamePhase::Error {
            return;
        }
        let from = ledger.phase;
        ledger.phase = GamePhase::Error;
        tracing::error!(?session, ?from, "session marked errored");
        bus.publish(Event::new(
            EventPriority::Immediate,
            EventPayload::PhaseChanged {
                session,
                from,
                to: GamePhase::Error,
            },
        ));
    }

    // ===== BOOKKEEPING =====

    /// Log an action against the current turn; false outside `Active`
    pub fn record_action(&mut self, session: SessionId, action: TurnAction) -> bool {
        let ledger = self.ledger_mut(session);
        if ledger.phase != GamePhase::Active {
            return false;
        }
        match ledger.turn.as_mut() {
            Some(turn) => {
                turn.actions.push(action);
                true
            }
            None => false,
        }
    }

    /// Advisory within-turn phase marker
    pub fn set_turn_phase(&mut self, session: SessionId, phase: TurnPhase) -> bool {
        let ledger = self.ledger_mut(session);
        match ledger.turn.as_mut() {
            Some(turn) => {
                turn.phase = phase;
                true
            }
            None => false,
        }
    }

    /// Refresh a player's unit counts; false for unknown players
    pub fn set_unit_census(
        &mut self,
        session: SessionId,
        player: PlayerId,
        alive: usize,
        total: usize,
    ) -> bool {
        let ledger = self.ledger_mut(session);
        match ledger.players.iter_mut().find(|p| p.id == player) {
            Some(seat) => {
                seat.units_alive = alive;
                seat.units_total = total;
                true
            }
            None => false,
        }
    }

    // ===== QUERIES =====

    pub fn phase(&self, session: SessionId) -> GamePhase {
        self.ledger(session).phase
    }

    pub fn mode(&self, session: SessionId) -> TurnMode {
        self.ledger(session).mode
    }

    pub fn players(&self, session: SessionId) -> &[PlayerState] {
        &self.ledger(session).players
    }

    pub fn player(&self, session: SessionId, player: PlayerId) -> Option<&PlayerState> {
        self.ledger(session).players.iter().find(|p| p.id == player)
    }

    pub fn current_player(&self, session: SessionId) -> Option<PlayerId> {
        self.ledger(session).turn.as_ref().map(|t| t.current_player)
    }

    /// Turn counter; 0 before the game starts
    pub fn turn_number(&self, session: SessionId) -> u32 {
        self.ledger(session)
            .turn
            .as_ref()
            .map(|t| t.turn_number)
            .unwrap_or(0)
    }

    /// Wire-shaped view of the running turn
    pub fn turn_info(&self, session: SessionId, now: Instant) -> Option<TurnInfo> {
        self.ledger(session).turn.as_ref().map(|turn| TurnInfo {
            current_player: turn.current_player,
            turn_number: turn.turn_number,
            time_remaining: turn.time_remaining(now),
        })
    }

    /// Actions logged so far this turn
    pub fn actions(&self, session: SessionId) -> &[TurnAction] {
        self.ledger(session)
            .turn
            .as_ref()
            .map(|t| t.actions.as_slice())
            .unwrap_or(&[])
    }

    pub fn metrics(&self, session: SessionId) -> &TurnMetrics {
        &self.ledger(session).metrics
    }

    /// Final report; None until the game has ended
    pub fn report(&self, session: SessionId) -> Option<&GameReport> {
        self.ledger(session).report.as_ref()
    }
}
