//! Headless Skirmish Runner
//!
//! Runs an AI vs AI session against the bundled scripted decision
//! service: builds a battlefield, seats two AI players, then ticks the
//! engine until somebody wins or the turn cap calls it a draw. Attack
//! resolution lives here rather than in the engine, the same place a
//! real host would put its combat rules.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use skirmish::ai::service::AiService;
use skirmish::ai::transport::ScriptedTransport;
use skirmish::core::config::EngineConfig;
use skirmish::core::error::{EngineError, Result};
use skirmish::core::types::{PlayerId, SessionId, Team, UnitId};
use skirmish::engine::units::UnitStats;
use skirmish::engine::GameEngine;
use skirmish::events::{EventKind, EventPayload};
use skirmish::grid::position::GridPos;
use skirmish::grid::terrain::Terrain;
use skirmish::turn::conditions::{GameConditions, VictoryCondition};
use skirmish::turn::state::{GamePhase, TurnMode};

/// Headless Skirmish Runner - AI vs AI sessions over the scripted service
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Run an AI vs AI skirmish and print the final report")]
struct Args {
    /// Battlefield width in tiles
    #[arg(long, default_value_t = 12)]
    width: i32,

    /// Battlefield height in tiles
    #[arg(long, default_value_t = 12)]
    height: i32,

    /// Units per side
    #[arg(long, default_value_t = 3)]
    units: usize,

    /// Turn cap before the session is called a draw
    #[arg(long, default_value_t = 40)]
    turn_limit: u32,

    /// Maximum engine ticks before giving up
    #[arg(long, default_value_t = 100_000)]
    max_ticks: u64,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Engine configuration TOML; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: json or text
    #[arg(long, default_value = "text")]
    format: String,

    /// Log unit-level events while the session runs
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if args.verbose {
            "skirmish=debug"
        } else {
            "skirmish=info"
        })
        .init();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path).map_err(EngineError::ConfigError)?,
        None => EngineConfig::default(),
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, "starting skirmish");

    let mut engine = GameEngine::new(config.clone());
    let (handle, pump) = AiService::spawn(
        Arc::new(ScriptedTransport::seeded(seed)),
        config.ai.clone(),
    );
    engine.attach_service(handle);

    let session = engine.create_session(
        args.width,
        args.height,
        TurnMode::Sequential,
        GameConditions {
            victory: vec![VictoryCondition::EliminateAll],
            turn_limit: Some(args.turn_limit),
            time_limit: None,
        },
    );

    scatter_terrain(&mut engine, session, args.width, args.height, seed);

    let red = engine
        .add_player(session, Team(1), true)
        .expect("players can join during setup");
    let blue = engine
        .add_player(session, Team(2), true)
        .expect("players can join during setup");

    engine.begin_deployment(session);
    spawn_side(&mut engine, session, red, 1, args.units, args.height);
    spawn_side(
        &mut engine,
        session,
        blue,
        args.width - 2,
        args.units,
        args.height,
    );

    // Attack requests come back through the bus; the host resolves them
    let attacks: Rc<RefCell<Vec<(UnitId, UnitId)>>> = Rc::default();
    {
        let attacks = Rc::clone(&attacks);
        engine.subscribe(EventKind::AttackRequested, move |event, _writer| {
            if let EventPayload::AttackRequested {
                attacker, target, ..
            } = event.payload
            {
                attacks.borrow_mut().push((attacker, target));
            }
            Ok(())
        });
    }

    if args.verbose {
        engine.subscribe(EventKind::TurnStarted, |event, _writer| {
            if let EventPayload::TurnStarted { player, turn, .. } = &event.payload {
                eprintln!("--- Turn {} ({:?}) ---", turn, player);
            }
            Ok(())
        });
        engine.subscribe(EventKind::UnitMoved, |event, _writer| {
            if let EventPayload::UnitMoved { unit, from, to, .. } = &event.payload {
                eprintln!(
                    "  {:?} moved ({}, {}) -> ({}, {})",
                    unit, from.x, from.y, to.x, to.y
                );
            }
            Ok(())
        });
        engine.subscribe(EventKind::AiTimeout, |event, _writer| {
            if let EventPayload::AiTimeout { unit, .. } = &event.payload {
                eprintln!("  {:?} timed out and forfeits", unit);
            }
            Ok(())
        });
    }

    let start = Instant::now();
    assert!(
        engine.start_game(session, start),
        "session failed to start"
    );

    let mut ticks = 0u64;
    while ticks < args.max_ticks {
        engine.tick(session, Instant::now());
        resolve_attacks(&mut engine, session, &attacks);
        if engine.phase(session) == GamePhase::Ended {
            break;
        }
        ticks += 1;
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let elapsed = start.elapsed();

    match engine.report(session) {
        Some(report) if args.format == "json" => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        Some(report) => {
            println!("=== Skirmish over ===");
            println!(
                "Outcome: {:?} (winner: {:?})",
                report.reason, report.winner
            );
            println!(
                "Turns: {} (average {:.2?}, longest {:.2?})",
                report.total_turns, report.average_turn, report.longest_turn
            );
            println!("Game time: {:.2?} over {} ticks", report.total_time, ticks);
        }
        None => {
            println!(
                "No result after {} ticks ({:.2?}); raise --max-ticks or lower --turn-limit",
                ticks, elapsed
            );
        }
    }

    let metrics = engine.ai_metrics();
    println!(
        "AI decisions: {} issued, {} applied, {} timeouts, {} failures (mean latency {:.2?})",
        metrics.requests_issued,
        metrics.decisions_applied,
        metrics.timeouts,
        metrics.failures,
        metrics.mean_latency()
    );

    engine.shutdown();
    let _ = pump.await;
    Ok(())
}

/// Sprinkle slow and impassable terrain across the middle of the field,
/// leaving both spawn columns clear
fn scatter_terrain(
    engine: &mut GameEngine,
    session: SessionId,
    width: i32,
    height: i32,
    seed: u64,
) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for x in 2..width - 2 {
        for y in 0..height {
            let roll: f32 = rng.gen();
            let terrain = if roll < 0.06 {
                Terrain::Walls
            } else if roll < 0.14 {
                Terrain::Forest
            } else if roll < 0.18 {
                Terrain::Water
            } else if roll < 0.24 {
                Terrain::Rough
            } else {
                continue;
            };
            engine.set_terrain(session, GridPos::new(x, y), terrain);
        }
    }
}

/// Place one side's units down a column, every third one a ranged build
fn spawn_side(
    engine: &mut GameEngine,
    session: SessionId,
    owner: PlayerId,
    column: i32,
    count: usize,
    height: i32,
) {
    let spacing = height / (count as i32 + 1);
    for i in 0..count {
        let y = spacing * (i as i32 + 1);
        let stats = if i % 3 == 2 {
            UnitStats {
                attack_range: 3,
                attack: 2,
                max_health: 7,
                ..Default::default()
            }
        } else {
            UnitStats::default()
        };
        let spawned = engine.spawn_unit(session, owner, GridPos::new(column, y), stats);
        if spawned.is_none() {
            tracing::warn!(column, y, "spawn tile unavailable, side fields fewer units");
        }
    }
}

/// Flat damage rule for the demo: attack minus defense, minimum 1
fn resolve_attacks(
    engine: &mut GameEngine,
    session: SessionId,
    attacks: &Rc<RefCell<Vec<(UnitId, UnitId)>>>,
) {
    let queued: Vec<(UnitId, UnitId)> = attacks.borrow_mut().drain(..).collect();
    for (attacker, target) in queued {
        let damage = match (engine.unit(session, attacker), engine.unit(session, target)) {
            (Some(a), Some(t)) => (a.stats.attack - t.stats.defense).max(1),
            _ => continue,
        };
        engine.damage_unit(session, target, damage);
    }
}
