//! Turn coordination: phases, players, clocks, victory

pub mod conditions;
pub mod coordinator;
pub mod player;
pub mod state;

pub use conditions::{GameConditions, GameOutcome, VictoryCondition, VictoryFacts};
pub use coordinator::TurnCoordinator;
pub use player::PlayerState;
pub use state::{
    GameOverReason, GamePhase, GameReport, TurnAction, TurnActionKind, TurnInfo, TurnMetrics,
    TurnMode, TurnPhase, TurnState,
};
