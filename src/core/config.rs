//! Engine configuration loaded from TOML
//!
//! Every tunable the engine consults lives here. Instances are passed into
//! the structs that need them; there is no global accessor.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Battlefield defaults used when a session does not specify its own
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Default battlefield width in tiles
    pub default_width: i32,
    /// Default battlefield height in tiles
    pub default_height: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            default_width: 20,
            default_height: 20,
        }
    }
}

/// Turn pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Per-turn clock in seconds; 0 disables the turn timer
    pub time_limit_secs: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self { time_limit_secs: 60 }
    }
}

impl TurnConfig {
    /// Per-turn clock as a Duration, None when disabled
    pub fn time_limit(&self) -> Option<Duration> {
        if self.time_limit_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.time_limit_secs))
        }
    }
}

/// AI decision service tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// How long a decision request may stay unanswered before the unit
    /// forfeits its action
    pub decision_timeout_secs: u64,
    /// Interval between liveness pings to the decision service
    pub heartbeat_interval_secs: u64,
    /// First reconnect delay; each further attempt doubles it
    pub reconnect_base_ms: u64,
    /// Reconnect attempts before the link is declared failed
    pub reconnect_max_attempts: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            decision_timeout_secs: 30,
            heartbeat_interval_secs: 10,
            reconnect_base_ms: 500,
            reconnect_max_attempts: 5,
        }
    }
}

impl AiConfig {
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }
}

/// Event dispatch tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Queued events drained per engine tick (immediate events are exempt)
    pub max_per_tick: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { max_per_tick: 64 }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub events: EventConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {:?}: {}", path, e))?;

        let config: EngineConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config TOML: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.grid.default_width <= 0 || self.grid.default_height <= 0 {
            return Err(format!(
                "battlefield dimensions must be positive ({} x {})",
                self.grid.default_width, self.grid.default_height
            ));
        }

        if self.ai.decision_timeout_secs == 0 {
            return Err("decision_timeout_secs must be positive".into());
        }

        if self.ai.reconnect_base_ms == 0 {
            return Err("reconnect_base_ms must be positive".into());
        }

        // A timer shorter than the AI decision window would forfeit every
        // AI turn before the service can answer.
        if self.turn.time_limit_secs != 0 && self.turn.time_limit_secs < self.ai.decision_timeout_secs
        {
            return Err(format!(
                "turn time limit ({}s) must be >= AI decision timeout ({}s)",
                self.turn.time_limit_secs, self.ai.decision_timeout_secs
            ));
        }

        if self.events.max_per_tick == 0 {
            return Err("events.max_per_tick must be positive".into());
        }

        Ok(())
    }
}
