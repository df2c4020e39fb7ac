//! Host facade: one `GameEngine` owns every subsystem
//!
//! The engine wires the spatial grid, turn coordinator, AI pipeline,
//! and event bus together behind a synchronous API. Hosts call `tick`
//! once per frame with the current time; everything else is ordinary
//! method calls. Gameplay mistakes come back as sentinel values, and
//! unknown session ids panic, same as the subsystems underneath.

pub mod units;

use std::time::Instant;

use ahash::AHashMap;

use crate::ai::coordinator::{AiCoordinator, AiMetrics};
use crate::ai::protocol::{AiAction, DecisionRequest, DecisionResponse};
use crate::ai::service::{LinkHealth, ServiceHandle};
use crate::core::config::EngineConfig;
use crate::core::types::{PlayerId, SessionId, Team, UnitId};
use crate::events::{
    BusStats, Event, EventBus, EventKind, EventPayload, EventPriority, HandlerResult,
    SubscriptionId,
};
use crate::grid::battlefield::{Battlefield, BattlefieldSnapshot};
use crate::grid::manager::SpatialGrid;
use crate::grid::position::{DistanceMetric, GridPos};
use crate::grid::terrain::Terrain;
use crate::path::{los, reachable};
use crate::turn::conditions::{GameConditions, VictoryFacts};
use crate::turn::coordinator::TurnCoordinator;
use crate::turn::player::PlayerState;
use crate::turn::state::{
    GamePhase, GameReport, TurnAction, TurnActionKind, TurnInfo, TurnMode, TurnPhase,
};
use units::{Unit, UnitRoster, UnitStats};

/// Victory evaluation view assembled fresh each tick
struct FactsView<'a> {
    teams: Vec<Team>,
    roster: &'a UnitRoster,
    field: &'a Battlefield,
}

impl VictoryFacts for FactsView<'_> {
    fn teams(&self) -> Vec<Team> {
        self.teams.clone()
    }

    fn living_units(&self, team: Team) -> usize {
        self.roster.living_of_team(team)
    }

    fn objectives_held(&self, team: Team) -> usize {
        self.field
            .objectives()
            .iter()
            .filter_map(|&pos| self.field.occupant(pos))
            .filter_map(|id| self.roster.get(id))
            .filter(|u| u.is_alive() && u.team == team)
            .count()
    }

    fn unit_alive(&self, unit: UnitId) -> bool {
        self.roster.get(unit).map(|u| u.is_alive()).unwrap_or(false)
    }

    fn holder_of(&self, pos: GridPos) -> Option<Team> {
        self.field
            .occupant(pos)
            .and_then(|id| self.roster.get(id))
            .filter(|u| u.is_alive())
            .map(|u| u.team)
    }
}

/// The whole session engine behind one handle
pub struct GameEngine {
    config: EngineConfig,
    grid: SpatialGrid,
    turns: TurnCoordinator,
    ai: AiCoordinator,
    bus: EventBus,
    rosters: AHashMap<SessionId, UnitRoster>,
    link: Option<ServiceHandle>,
    /// (turn_number, current_player) seen last tick, per session
    last_turn: AHashMap<SessionId, (u32, Option<PlayerId>)>,
}

impl GameEngine {
    pub fn new(config: EngineConfig) -> Self {
        let decision_timeout = config.ai.decision_timeout();
        Self {
            config,
            grid: SpatialGrid::new(),
            turns: TurnCoordinator::new(),
            ai: AiCoordinator::new(decision_timeout),
            bus: EventBus::new(),
            rosters: AHashMap::new(),
            link: None,
            last_turn: AHashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn roster(&self, session: SessionId) -> &UnitRoster {
        match self.rosters.get(&session) {
            Some(roster) => roster,
            None => panic!("no roster for session {:?}", session),
        }
    }

    fn roster_mut(&mut self, session: SessionId) -> &mut UnitRoster {
        match self.rosters.get_mut(&session) {
            Some(roster) => roster,
            None => panic!("no roster for session {:?}", session),
        }
    }

    // ===== SESSION LIFECYCLE =====

    pub fn create_session(
        &mut self,
        width: i32,
        height: i32,
        mode: TurnMode,
        conditions: GameConditions,
    ) -> SessionId {
        let session = SessionId::new();
        self.grid.initialize(session, width, height);
        self.turns
            .create_session(session, mode, conditions, self.config.turn.time_limit());
        self.rosters.insert(session, UnitRoster::default());
        tracing::info!(?session, width, height, ?mode, "session created");
        session
    }

    pub fn destroy_session(&mut self, session: SessionId) -> bool {
        let existed = self.rosters.remove(&session).is_some();
        self.grid.remove_session(session);
        self.turns.remove_session(session);
        self.ai.remove_session(session);
        self.last_turn.remove(&session);
        if existed {
            tracing::info!(?session, "session destroyed");
        }
        existed
    }

    pub fn add_player(&mut self, session: SessionId, team: Team, is_ai: bool) -> Option<PlayerId> {
        self.turns.add_player(session, team, is_ai)
    }

    pub fn set_player_active(
        &mut self,
        session: SessionId,
        player: PlayerId,
        active: bool,
    ) -> bool {
        self.turns.set_player_active(session, player, active)
    }

    pub fn begin_deployment(&mut self, session: SessionId) -> bool {
        self.turns.begin_deployment(session, &mut self.bus)
    }

    pub fn start_game(&mut self, session: SessionId, now: Instant) -> bool {
        let started = self.turns.start_game(session, now, &mut self.bus);
        if started {
            self.refresh_census(session);
        }
        started
    }

    pub fn pause(&mut self, session: SessionId, now: Instant) -> bool {
        self.turns.pause(session, now, &mut self.bus)
    }

    pub fn resume(&mut self, session: SessionId, now: Instant) -> bool {
        self.turns.resume(session, now, &mut self.bus)
    }

    pub fn end_turn(&mut self, session: SessionId, player: PlayerId, now: Instant) -> bool {
        self.turns.end_turn(session, player, now, &mut self.bus)
    }

    // ===== BOARD SETUP =====

    pub fn set_terrain(&mut self, session: SessionId, pos: GridPos, terrain: Terrain) -> bool {
        self.grid.set_terrain(session, pos, terrain)
    }

    pub fn mark_objective(&mut self, session: SessionId, pos: GridPos) -> bool {
        self.grid.mark_objective(session, pos)
    }

    /// Place a new unit for `owner`. None when the phase is wrong, the
    /// owner is unknown, or the tile cannot be occupied.
    pub fn spawn_unit(
        &mut self,
        session: SessionId,
        owner: PlayerId,
        position: GridPos,
        stats: UnitStats,
    ) -> Option<UnitId> {
        if !matches!(
            self.turns.phase(session),
            GamePhase::Setup | GamePhase::Deployment
        ) {
            return None;
        }
        let (team, is_ai) = match self.turns.player(session, owner) {
            Some(player) => (player.team, player.is_ai),
            None => return None,
        };

        let unit = Unit::new(owner, team, position, stats);
        let id = unit.id;
        if !self.grid.field_mut(session).occupy(position, id) {
            return None;
        }
        self.roster_mut(session).insert(unit);
        if is_ai {
            self.ai.register_unit(session, id);
        }
        self.bus.publish(Event::new(
            EventPriority::Normal,
            EventPayload::UnitSpawned {
                session,
                unit: id,
                position,
            },
        ));
        self.refresh_census(session);
        Some(id)
    }

    // ===== PLAYER ACTIONS =====

    /// Move a unit within its movement budget; false leaves everything
    /// untouched
    pub fn move_unit(&mut self, session: SessionId, unit: UnitId, to: GridPos) -> bool {
        match self.perform_move(session, unit, to) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(?session, ?unit, %reason, "move rejected");
                false
            }
        }
    }

    /// Ask for an attack to be resolved by the combat collaborator
    pub fn request_attack(&mut self, session: SessionId, attacker: UnitId, target: UnitId) -> bool {
        match self.perform_attack(session, attacker, target) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(?session, ?attacker, %reason, "attack rejected");
                false
            }
        }
    }

    /// Combat write-back: subtract health, handle death. False for
    /// unknown or already-dead units.
    pub fn damage_unit(&mut self, session: SessionId, unit: UnitId, amount: i32) -> bool {
        let (died, position) = match self.roster_mut(session).get_mut(unit) {
            Some(target) if target.is_alive() => {
                target.health = (target.health - amount).max(0);
                (!target.is_alive(), target.position)
            }
            _ => return false,
        };
        if died {
            tracing::debug!(?session, ?unit, "unit destroyed");
            self.grid.field_mut(session).vacate(position);
            self.ai.unregister_unit(session, unit);
            self.refresh_census(session);
        }
        true
    }

    // ===== ACTION VALIDATION =====

    /// May `owner` act right now
    fn may_act(&self, session: SessionId, owner: PlayerId) -> bool {
        if self.turns.phase(session) != GamePhase::Active {
            return false;
        }
        match self.turns.mode(session) {
            TurnMode::Sequential => self.turns.current_player(session) == Some(owner),
            TurnMode::Simultaneous => self
                .turns
                .player(session, owner)
                .map(|p| p.active && !p.has_acted)
                .unwrap_or(false),
        }
    }

    fn perform_move(
        &mut self,
        session: SessionId,
        unit_id: UnitId,
        to: GridPos,
    ) -> Result<(), String> {
        let (from, movement, flying, owner) = match self.roster(session).get(unit_id) {
            Some(unit) if unit.is_alive() => {
                if unit.has_moved {
                    return Err("unit already moved this turn".into());
                }
                (
                    unit.position,
                    unit.stats.movement_range,
                    unit.stats.flying,
                    unit.owner,
                )
            }
            _ => return Err("unknown or dead unit".into()),
        };
        if !self.may_act(session, owner) {
            return Err("not this player's turn".into());
        }
        {
            let field = self.grid.field(session);
            if !reachable::reachable_tiles(field, from, movement, false, flying).contains(&to) {
                return Err(format!("({}, {}) is out of reach", to.x, to.y));
            }
        }

        let field = self.grid.field_mut(session);
        if !field.vacate(from) || !field.occupy(to, unit_id) {
            self.turns.mark_error(session, &mut self.bus);
            return Err("occupancy out of sync".into());
        }
        if let Some(unit) = self.roster_mut(session).get_mut(unit_id) {
            unit.position = to;
            unit.has_moved = true;
        }
        self.turns.set_turn_phase(session, TurnPhase::Movement);
        self.turns.record_action(
            session,
            TurnAction {
                player: owner,
                kind: TurnActionKind::Move {
                    unit: unit_id,
                    from,
                    to,
                },
            },
        );
        self.bus.publish(Event::new(
            EventPriority::Normal,
            EventPayload::UnitMoved {
                session,
                unit: unit_id,
                from,
                to,
            },
        ));
        Ok(())
    }

    fn perform_attack(
        &mut self,
        session: SessionId,
        attacker_id: UnitId,
        target_id: UnitId,
    ) -> Result<(), String> {
        let (attacker_pos, range, team, owner) = match self.roster(session).get(attacker_id) {
            Some(unit) if unit.is_alive() => {
                if unit.has_acted {
                    return Err("unit already acted this turn".into());
                }
                (unit.position, unit.stats.attack_range, unit.team, unit.owner)
            }
            _ => return Err("unknown or dead attacker".into()),
        };
        let target_pos = match self.roster(session).get(target_id) {
            Some(unit) if unit.is_alive() => {
                if unit.team == team {
                    return Err("cannot target own team".into());
                }
                unit.position
            }
            _ => return Err("unknown or dead target".into()),
        };
        if !self.may_act(session, owner) {
            return Err("not this player's turn".into());
        }
        let distance = attacker_pos.distance(&target_pos, DistanceMetric::Manhattan);
        if distance > range as f32 {
            return Err("target out of range".into());
        }
        if !los::line_of_sight(self.grid.field(session), attacker_pos, target_pos) {
            return Err("no line of sight".into());
        }

        if let Some(unit) = self.roster_mut(session).get_mut(attacker_id) {
            unit.has_acted = true;
        }
        self.turns.set_turn_phase(session, TurnPhase::Action);
        self.turns.record_action(
            session,
            TurnAction {
                player: owner,
                kind: TurnActionKind::Attack {
                    attacker: attacker_id,
                    target: target_id,
                },
            },
        );
        self.bus.publish(Event::new(
            EventPriority::High,
            EventPayload::AttackRequested {
                session,
                attacker: attacker_id,
                target: target_id,
            },
        ));
        Ok(())
    }

    fn perform_ability(
        &mut self,
        session: SessionId,
        unit_id: UnitId,
        ability: String,
        target: Option<GridPos>,
    ) -> Result<(), String> {
        let owner = match self.roster(session).get(unit_id) {
            Some(unit) if unit.is_alive() => {
                if unit.has_acted {
                    return Err("unit already acted this turn".into());
                }
                unit.owner
            }
            _ => return Err("unknown or dead unit".into()),
        };
        if !self.may_act(session, owner) {
            return Err("not this player's turn".into());
        }

        if let Some(unit) = self.roster_mut(session).get_mut(unit_id) {
            unit.has_acted = true;
        }
        self.turns.set_turn_phase(session, TurnPhase::Action);
        self.turns.record_action(
            session,
            TurnAction {
                player: owner,
                kind: TurnActionKind::Ability {
                    unit: unit_id,
                    ability: ability.clone(),
                },
            },
        );
        self.bus.publish(Event::new(
            EventPriority::High,
            EventPayload::AbilityRequested {
                session,
                unit: unit_id,
                ability,
                target,
            },
        ));
        Ok(())
    }

    fn perform_wait(&mut self, session: SessionId, unit_id: UnitId) -> Result<(), String> {
        let owner = match self.roster(session).get(unit_id) {
            Some(unit) if unit.is_alive() => unit.owner,
            _ => return Err("unknown or dead unit".into()),
        };
        if !self.may_act(session, owner) {
            return Err("not this player's turn".into());
        }
        if let Some(unit) = self.roster_mut(session).get_mut(unit_id) {
            unit.has_moved = true;
            unit.has_acted = true;
        }
        self.turns.record_action(
            session,
            TurnAction {
                player: owner,
                kind: TurnActionKind::Wait { unit: unit_id },
            },
        );
        Ok(())
    }

    // ===== AI PIPELINE =====

    pub fn attach_service(&mut self, link: ServiceHandle) {
        self.link = Some(link);
    }

    pub fn service_health(&self) -> Option<LinkHealth> {
        self.link.as_ref().map(|l| l.health())
    }

    /// Close the decision link and drop queued work without flushing
    pub fn shutdown(&mut self) {
        if self.link.take().is_some() {
            tracing::info!("decision link closed");
        }
        self.bus.clear();
    }

    /// Apply one decision. False means it was ignored (late, unknown,
    /// or rejected on re-validation) and nothing changed.
    pub fn submit_decision(&mut self, response: DecisionResponse, now: Instant) -> bool {
        let Some(pending) = self.ai.take_pending(response.request_id) else {
            tracing::debug!(
                request = ?response.request_id,
                "late or unknown decision ignored"
            );
            return false;
        };
        let session = pending.session;
        let unit = pending.unit;
        let request = pending.request;
        let latency = now.duration_since(pending.issued_at);

        let outcome = match response.decision {
            AiAction::Move { target_position } => self.perform_move(session, unit, target_position),
            AiAction::Attack { target_id } => self.perform_attack(session, unit, target_id),
            AiAction::Ability {
                ability,
                target_position,
            } => self.perform_ability(session, unit, ability, target_position),
            AiAction::Wait => self.perform_wait(session, unit),
        };

        match outcome {
            Ok(()) => {
                self.ai.record_applied(latency);
                self.bus.publish(Event::new(
                    EventPriority::Normal,
                    EventPayload::DecisionApplied {
                        session,
                        request,
                        unit,
                        latency,
                    },
                ));
                true
            }
            Err(message) => {
                tracing::warn!(?session, ?unit, %message, "decision rejected");
                self.ai.record_failure();
                self.bus.publish(Event::new(
                    EventPriority::High,
                    EventPayload::AiError {
                        session,
                        request: Some(request),
                        unit: Some(unit),
                        message,
                    },
                ));
                false
            }
        }
    }

    /// Build and record requests for every AI player due to act. The
    /// caller ships them over its transport; entries wait in the
    /// pending table either way.
    pub fn issue_decision_requests(
        &mut self,
        session: SessionId,
        now: Instant,
    ) -> Vec<DecisionRequest> {
        let mut all = Vec::new();
        for player in self.ai_candidates(session) {
            let Some(info) = self.turns.turn_info(session, now) else {
                break;
            };
            let requests = {
                let field = self.grid.field(session);
                let roster = match self.rosters.get(&session) {
                    Some(roster) => roster,
                    None => panic!("no roster for session {:?}", session),
                };
                self.ai
                    .request_decisions(session, player, field, roster, info, now, &mut self.bus)
            };
            all.extend(requests);
        }
        all
    }

    /// AI players that are due to act right now
    fn ai_candidates(&self, session: SessionId) -> Vec<PlayerId> {
        if self.turns.phase(session) != GamePhase::Active {
            return Vec::new();
        }
        match self.turns.mode(session) {
            TurnMode::Sequential => match self.turns.current_player(session) {
                Some(current)
                    if self
                        .turns
                        .player(session, current)
                        .map(|p| p.is_ai)
                        .unwrap_or(false) =>
                {
                    vec![current]
                }
                _ => Vec::new(),
            },
            TurnMode::Simultaneous => self
                .turns
                .players(session)
                .iter()
                .filter(|p| p.is_ai && p.active && !p.has_acted)
                .map(|p| p.id)
                .collect(),
        }
    }

    fn drive_ai(&mut self, session: SessionId, now: Instant) {
        let candidates = self.ai_candidates(session);
        if candidates.is_empty() {
            return;
        }

        match self.link.as_ref().map(|l| l.health()) {
            Some(LinkHealth::Failed) | None => {
                let attached = self.link.is_some();
                for player in candidates {
                    self.forfeit_ai_turn(session, player, attached, now);
                }
            }
            _ => {
                let requests = self.issue_decision_requests(session, now);
                for request in requests {
                    if let Some(link) = &self.link {
                        if !link.submit(request) {
                            tracing::warn!(?session, "decision channel full, request will time out");
                        }
                    }
                }
                for player in candidates {
                    self.try_finish_ai_turn(session, player, now);
                }
            }
        }
    }

    /// The service cannot answer; the player's remaining units forfeit
    fn forfeit_ai_turn(
        &mut self,
        session: SessionId,
        player: PlayerId,
        link_attached: bool,
        now: Instant,
    ) {
        let undone: Vec<UnitId> = self
            .roster(session)
            .owned_by(player)
            .filter(|u| u.is_alive() && !u.is_done())
            .map(|u| u.id)
            .collect();

        if !undone.is_empty() {
            let message = if link_attached {
                "decision link failed, forfeiting turn".to_string()
            } else {
                "no decision service attached, forfeiting turn".to_string()
            };
            tracing::warn!(?session, ?player, %message);
            self.bus.publish(Event::new(
                EventPriority::High,
                EventPayload::AiError {
                    session,
                    request: None,
                    unit: None,
                    message,
                },
            ));
            for unit in undone {
                if let Some(u) = self.roster_mut(session).get_mut(unit) {
                    u.has_moved = true;
                    u.has_acted = true;
                }
                self.turns.record_action(
                    session,
                    TurnAction {
                        player,
                        kind: TurnActionKind::Forfeit { unit },
                    },
                );
            }
        }
        self.try_finish_ai_turn(session, player, now);
    }

    /// End the AI player's turn once nothing is left to decide
    fn try_finish_ai_turn(&mut self, session: SessionId, player: PlayerId, now: Instant) {
        let pending = self.ai.pending_units(session);
        let waiting = pending
            .iter()
            .any(|&id| self.roster(session).get(id).map(|u| u.owner) == Some(player));
        let all_done = !waiting
            && self
                .roster(session)
                .owned_by(player)
                .filter(|u| u.is_alive())
                .all(|u| u.is_done());
        if all_done {
            tracing::debug!(?session, ?player, "ai player finished, ending turn");
            self.turns.end_turn(session, player, now, &mut self.bus);
        }
    }

    // ===== TICK =====

    /// One engine step: apply arrived decisions, advance clocks and
    /// victory, drive AI players, expire overdue requests, deliver
    /// events. Returns how many events were dispatched.
    pub fn tick(&mut self, session: SessionId, now: Instant) -> usize {
        let responses = match self.link.as_mut() {
            Some(link) => link.drain(),
            None => Vec::new(),
        };
        for response in responses {
            self.submit_decision(response, now);
        }

        self.update_turns(session, now);
        self.detect_turn_boundary(session);
        self.drive_ai(session, now);

        let expired = self.ai.sweep_timeouts(now, &mut self.bus);
        for pending in expired {
            let owner = match self.roster_mut(pending.session).get_mut(pending.unit) {
                Some(unit) => {
                    unit.has_moved = true;
                    unit.has_acted = true;
                    Some(unit.owner)
                }
                None => None,
            };
            if let Some(player) = owner {
                self.turns.record_action(
                    pending.session,
                    TurnAction {
                        player,
                        kind: TurnActionKind::Forfeit { unit: pending.unit },
                    },
                );
            }
        }

        self.bus.process_events(self.config.events.max_per_tick)
    }

    fn update_turns(&mut self, session: SessionId, now: Instant) {
        let mut teams: Vec<Team> = Vec::new();
        for player in self.turns.players(session) {
            if !teams.contains(&player.team) {
                teams.push(player.team);
            }
        }
        let view = FactsView {
            teams,
            roster: match self.rosters.get(&session) {
                Some(roster) => roster,
                None => panic!("no roster for session {:?}", session),
            },
            field: self.grid.field(session),
        };
        self.turns.update(session, &view, now, &mut self.bus);
    }

    /// On a new turn, clear per-unit flags and refresh unit counts
    fn detect_turn_boundary(&mut self, session: SessionId) {
        let key = (
            self.turns.turn_number(session),
            self.turns.current_player(session),
        );
        if self.last_turn.get(&session) == Some(&key) {
            return;
        }
        self.last_turn.insert(session, key);
        if key.1.is_none() {
            return;
        }
        if let Some(roster) = self.rosters.get_mut(&session) {
            for unit in roster.iter_mut() {
                unit.reset_turn_flags();
            }
        }
        self.refresh_census(session);
    }

    fn refresh_census(&mut self, session: SessionId) {
        let counts: Vec<(PlayerId, usize, usize)> = {
            let roster = self.roster(session);
            self.turns
                .players(session)
                .iter()
                .map(|p| {
                    let total = roster.owned_by(p.id).count();
                    let alive = roster.owned_by(p.id).filter(|u| u.is_alive()).count();
                    (p.id, alive, total)
                })
                .collect()
        };
        for (player, alive, total) in counts {
            self.turns.set_unit_census(session, player, alive, total);
        }
    }

    // ===== EVENTS =====

    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event, &mut crate::events::EventWriter) -> HandlerResult + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn bus_stats(&self) -> BusStats {
        self.bus.stats()
    }

    // ===== QUERIES =====

    pub fn phase(&self, session: SessionId) -> GamePhase {
        self.turns.phase(session)
    }

    pub fn current_player(&self, session: SessionId) -> Option<PlayerId> {
        self.turns.current_player(session)
    }

    pub fn turn_info(&self, session: SessionId, now: Instant) -> Option<TurnInfo> {
        self.turns.turn_info(session, now)
    }

    pub fn players(&self, session: SessionId) -> &[PlayerState] {
        self.turns.players(session)
    }

    pub fn report(&self, session: SessionId) -> Option<&GameReport> {
        self.turns.report(session)
    }

    pub fn battlefield_snapshot(&self, session: SessionId) -> BattlefieldSnapshot {
        self.grid.snapshot(session)
    }

    pub fn unit(&self, session: SessionId, unit: UnitId) -> Option<&Unit> {
        self.roster(session).get(unit)
    }

    pub fn units(&self, session: SessionId) -> impl Iterator<Item = &Unit> {
        self.roster(session).iter()
    }

    pub fn ai_metrics(&self) -> &AiMetrics {
        self.ai.metrics()
    }

    /// Cache-aware pathfinding passthrough
    pub fn find_path(
        &mut self,
        session: SessionId,
        start: GridPos,
        goal: GridPos,
        ignore_occupants: bool,
        max_range: Option<f32>,
    ) -> Vec<GridPos> {
        self.grid
            .find_path(session, start, goal, ignore_occupants, max_range)
    }

    /// Tiles this unit could move to right now
    pub fn reachable_for(&self, session: SessionId, unit: UnitId) -> Vec<GridPos> {
        match self.roster(session).get(unit) {
            Some(u) if u.is_alive() => reachable::reachable_tiles(
                self.grid.field(session),
                u.position,
                u.stats.movement_range,
                false,
                u.stats.flying,
            ),
            _ => Vec::new(),
        }
    }
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::conditions::VictoryCondition;
    use std::time::Duration;

    fn duel() -> (GameEngine, SessionId, PlayerId, PlayerId, UnitId, UnitId, Instant) {
        let mut engine = GameEngine::default();
        let session = engine.create_session(
            10,
            10,
            TurnMode::Sequential,
            GameConditions {
                victory: vec![VictoryCondition::EliminateAll],
                ..Default::default()
            },
        );
        let red = engine.add_player(session, Team(1), false).unwrap();
        let blue = engine.add_player(session, Team(2), false).unwrap();
        let sword = engine
            .spawn_unit(session, red, GridPos::new(1, 1), UnitStats::default())
            .unwrap();
        let shield = engine
            .spawn_unit(session, blue, GridPos::new(8, 8), UnitStats::default())
            .unwrap();
        let t0 = Instant::now();
        assert!(engine.start_game(session, t0));
        (engine, session, red, blue, sword, shield, t0)
    }

    #[test]
    fn test_spawn_rejected_once_active() {
        let (mut engine, session, red, _blue, _sword, _shield, _t0) = duel();
        assert!(engine
            .spawn_unit(session, red, GridPos::new(2, 2), UnitStats::default())
            .is_none());
    }

    #[test]
    fn test_spawn_rejected_on_occupied_tile() {
        let mut engine = GameEngine::default();
        let session = engine.create_session(6, 6, TurnMode::Sequential, GameConditions::default());
        let red = engine.add_player(session, Team(1), false).unwrap();
        assert!(engine
            .spawn_unit(session, red, GridPos::new(2, 2), UnitStats::default())
            .is_some());
        assert!(engine
            .spawn_unit(session, red, GridPos::new(2, 2), UnitStats::default())
            .is_none());
    }

    #[test]
    fn test_move_updates_board_and_roster() {
        let (mut engine, session, _red, _blue, sword, _shield, _t0) = duel();
        assert!(engine.move_unit(session, sword, GridPos::new(3, 1)));

        let unit = engine.unit(session, sword).unwrap();
        assert_eq!(unit.position, GridPos::new(3, 1));
        assert!(unit.has_moved);
        assert!(engine.battlefield_snapshot(session).tiles.iter().any(|t| {
            t.position == GridPos::new(3, 1) && t.occupant == Some(sword)
        }));
    }

    #[test]
    fn test_move_rejected_out_of_reach() {
        let (mut engine, session, _red, _blue, sword, _shield, _t0) = duel();
        assert!(!engine.move_unit(session, sword, GridPos::new(8, 1)));
        assert_eq!(
            engine.unit(session, sword).unwrap().position,
            GridPos::new(1, 1)
        );
    }

    #[test]
    fn test_move_rejected_off_turn() {
        let (mut engine, session, _red, _blue, _sword, shield, _t0) = duel();
        // blue is not the current player
        assert!(!engine.move_unit(session, shield, GridPos::new(8, 6)));
    }

    #[test]
    fn test_attack_needs_range() {
        let (mut engine, session, _red, _blue, sword, shield, _t0) = duel();
        assert!(!engine.request_attack(session, sword, shield));
    }

    #[test]
    fn test_attack_publishes_request() {
        let mut engine = GameEngine::default();
        let session = engine.create_session(6, 6, TurnMode::Sequential, GameConditions::default());
        let red = engine.add_player(session, Team(1), false).unwrap();
        let blue = engine.add_player(session, Team(2), false).unwrap();
        let sword = engine
            .spawn_unit(session, red, GridPos::new(2, 2), UnitStats::default())
            .unwrap();
        let shield = engine
            .spawn_unit(session, blue, GridPos::new(2, 3), UnitStats::default())
            .unwrap();
        assert!(engine.start_game(session, Instant::now()));

        let before = engine.bus_stats().events_published;
        assert!(engine.request_attack(session, sword, shield));
        assert_eq!(engine.bus_stats().events_published, before + 1);
        assert!(engine.unit(session, sword).unwrap().has_acted);
    }

    #[test]
    fn test_damage_kills_and_frees_the_tile() {
        let (mut engine, session, _red, _blue, _sword, shield, t0) = duel();
        assert!(engine.damage_unit(session, shield, 999));
        assert!(!engine.unit(session, shield).unwrap().is_alive());
        assert!(!engine.damage_unit(session, shield, 1));

        // the tile frees up
        assert!(engine
            .battlefield_snapshot(session)
            .tiles
            .iter()
            .all(|t| t.occupant != Some(shield)));

        // elimination victory on the next tick
        engine.tick(session, t0 + Duration::from_millis(16));
        assert_eq!(engine.phase(session), GamePhase::Ended);
        assert_eq!(engine.report(session).unwrap().winner, Some(Team(1)));
    }

    #[test]
    fn test_ai_decision_round_trip() {
        let mut engine = GameEngine::default();
        let session = engine.create_session(8, 8, TurnMode::Sequential, GameConditions::default());
        let bot = engine.add_player(session, Team(1), true).unwrap();
        let _rival = engine.add_player(session, Team(2), false).unwrap();
        let pawn = engine
            .spawn_unit(session, bot, GridPos::new(4, 4), UnitStats::default())
            .unwrap();
        let t0 = Instant::now();
        assert!(engine.start_game(session, t0));

        let requests = engine.issue_decision_requests(session, t0);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].unit_id, pawn);

        let target = GridPos::new(5, 4);
        assert!(requests[0]
            .available_actions
            .contains(&AiAction::Move {
                target_position: target
            }));

        let applied = engine.submit_decision(
            DecisionResponse {
                request_id: requests[0].request_id,
                decision: AiAction::Move {
                    target_position: target,
                },
                confidence: 0.9,
                reasoning: None,
            },
            t0 + Duration::from_millis(120),
        );
        assert!(applied);
        assert_eq!(engine.unit(session, pawn).unwrap().position, target);
        assert_eq!(engine.ai_metrics().decisions_applied, 1);
        assert_eq!(
            engine.ai_metrics().mean_latency(),
            Duration::from_millis(120)
        );
    }

    #[test]
    fn test_same_decision_cannot_apply_twice() {
        let mut engine = GameEngine::default();
        let session = engine.create_session(8, 8, TurnMode::Sequential, GameConditions::default());
        let bot = engine.add_player(session, Team(1), true).unwrap();
        engine
            .spawn_unit(session, bot, GridPos::new(4, 4), UnitStats::default())
            .unwrap();
        let t0 = Instant::now();
        engine.start_game(session, t0);

        let requests = engine.issue_decision_requests(session, t0);
        let response = DecisionResponse {
            request_id: requests[0].request_id,
            decision: AiAction::Wait,
            confidence: 1.0,
            reasoning: None,
        };
        assert!(engine.submit_decision(response.clone(), t0));
        assert!(!engine.submit_decision(response, t0));
    }

    #[test]
    fn test_stale_move_rejected_without_mutation() {
        let mut engine = GameEngine::default();
        let session = engine.create_session(8, 8, TurnMode::Sequential, GameConditions::default());
        let bot = engine.add_player(session, Team(1), true).unwrap();
        let rival = engine.add_player(session, Team(2), false).unwrap();
        let pawn = engine
            .spawn_unit(session, bot, GridPos::new(2, 2), UnitStats::default())
            .unwrap();
        let blocker_home = GridPos::new(4, 2);
        let blocker = engine
            .spawn_unit(session, rival, GridPos::new(5, 5), UnitStats::default())
            .unwrap();
        let t0 = Instant::now();
        engine.start_game(session, t0);

        let requests = engine.issue_decision_requests(session, t0);
        assert!(requests[0].available_actions.contains(&AiAction::Move {
            target_position: blocker_home
        }));

        // the target tile fills while the service is thinking
        assert!(engine.grid.field_mut(session).vacate(GridPos::new(5, 5)));
        assert!(engine.grid.field_mut(session).occupy(blocker_home, blocker));

        let applied = engine.submit_decision(
            DecisionResponse {
                request_id: requests[0].request_id,
                decision: AiAction::Move {
                    target_position: blocker_home,
                },
                confidence: 0.9,
                reasoning: None,
            },
            t0 + Duration::from_secs(1),
        );
        assert!(!applied);
        assert_eq!(
            engine.unit(session, pawn).unwrap().position,
            GridPos::new(2, 2)
        );
        assert_eq!(engine.ai_metrics().failures, 1);
        assert_eq!(engine.ai_metrics().decisions_applied, 0);
    }

    #[test]
    fn test_timeout_forfeits_the_unit() {
        let mut engine = GameEngine::default();
        let session = engine.create_session(8, 8, TurnMode::Sequential, GameConditions::default());
        let bot = engine.add_player(session, Team(1), true).unwrap();
        let rival = engine.add_player(session, Team(2), false).unwrap();
        let pawn = engine
            .spawn_unit(session, bot, GridPos::new(4, 4), UnitStats::default())
            .unwrap();
        let t0 = Instant::now();
        engine.start_game(session, t0);

        engine.issue_decision_requests(session, t0);
        // no answer for longer than the decision timeout
        let late = t0 + engine.config().ai.decision_timeout() + Duration::from_secs(1);
        engine.tick(session, late);

        let unit = engine.unit(session, pawn).unwrap();
        assert!(unit.is_done());
        assert_eq!(engine.ai_metrics().timeouts, 1);
        // the forfeited AI turn hands play to the rival on a later tick
        engine.tick(session, late + Duration::from_millis(16));
        assert_eq!(engine.current_player(session), Some(rival));
    }

    #[test]
    fn test_unattached_ai_forfeits_turn() {
        let mut engine = GameEngine::default();
        let session = engine.create_session(8, 8, TurnMode::Sequential, GameConditions::default());
        let bot = engine.add_player(session, Team(1), true).unwrap();
        let rival = engine.add_player(session, Team(2), false).unwrap();
        engine
            .spawn_unit(session, bot, GridPos::new(4, 4), UnitStats::default())
            .unwrap();
        let t0 = Instant::now();
        engine.start_game(session, t0);
        assert_eq!(engine.current_player(session), Some(bot));

        engine.tick(session, t0 + Duration::from_millis(16));
        assert_eq!(engine.current_player(session), Some(rival));
    }

    #[test]
    fn test_destroy_session_clears_everything() {
        let (mut engine, session, _red, _blue, _sword, _shield, _t0) = duel();
        assert!(engine.destroy_session(session));
        assert!(!engine.destroy_session(session));
    }
}
