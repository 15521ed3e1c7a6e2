//! Match configuration with serde defaults and validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::constants::{
    CPU_ROLL_DELAY_FAST_MS, CPU_ROLL_DELAY_NORMAL_MS, CPU_ROLL_DELAY_SLOW_MS,
    SECONDARY_SLOT_MIN_PLAYERS, VICTORY_POINT_GOAL,
};
use crate::phase::Phase;

/// How randomness is sourced for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "seed", rename_all = "snake_case")]
pub enum DeterminismMode {
    /// All randomness derives from the given base seed; replayable.
    Seeded(u64),
    /// Ordinary entropy; reproducibility is not guaranteed.
    Free,
}

impl DeterminismMode {
    /// Whether this mode carries a reproducibility contract.
    #[must_use]
    pub const fn is_seeded(self) -> bool {
        matches!(self, Self::Seeded(_))
    }
}

impl Default for DeterminismMode {
    fn default() -> Self {
        Self::Free
    }
}

/// Pacing tier for autonomous play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CpuSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl CpuSpeed {
    /// Virtual delay applied between autonomous rolls.
    #[must_use]
    pub const fn roll_delay_ms(self) -> u64 {
        match self {
            Self::Slow => CPU_ROLL_DELAY_SLOW_MS,
            Self::Normal => CPU_ROLL_DELAY_NORMAL_MS,
            Self::Fast => CPU_ROLL_DELAY_FAST_MS,
        }
    }
}

/// Seat descriptor supplied at match creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatConfig {
    pub name: String,
    /// Computer-controlled seats play their turns end-to-end without input.
    #[serde(default)]
    pub autonomous: bool,
}

impl SeatConfig {
    #[must_use]
    pub fn human(name: &str) -> Self {
        Self {
            name: name.to_string(),
            autonomous: false,
        }
    }

    #[must_use]
    pub fn cpu(name: &str) -> Self {
        Self {
            name: name.to_string(),
            autonomous: true,
        }
    }
}

/// Full match configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub seats: Vec<SeatConfig>,
    #[serde(default)]
    pub cpu_speed: CpuSpeed,
    #[serde(default)]
    pub determinism: DeterminismMode,
    #[serde(default = "GameConfig::default_victory_goal")]
    pub victory_points_goal: u32,
    #[serde(default = "GameConfig::default_secondary_min")]
    pub secondary_slot_min_players: usize,
    /// Minimum dwell per phase in virtual milliseconds; transitions requested
    /// before the dwell elapses are deferred rather than applied.
    #[serde(default)]
    pub min_dwell_ms: HashMap<Phase, u64>,
}

impl GameConfig {
    const fn default_victory_goal() -> u32 {
        VICTORY_POINT_GOAL
    }

    const fn default_secondary_min() -> usize {
        SECONDARY_SLOT_MIN_PLAYERS
    }

    /// Convenience constructor for the common case.
    #[must_use]
    pub fn new(seats: Vec<SeatConfig>) -> Self {
        Self {
            seats,
            cpu_speed: CpuSpeed::default(),
            determinism: DeterminismMode::default(),
            victory_points_goal: Self::default_victory_goal(),
            secondary_slot_min_players: Self::default_secondary_min(),
            min_dwell_ms: HashMap::new(),
        }
    }

    /// Same configuration with a fixed seed attached.
    #[must_use]
    pub fn seeded(mut self, seed: u64) -> Self {
        self.determinism = DeterminismMode::Seeded(seed);
        self
    }

    /// Total seat count, including eliminated players later on.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.seats.len()
    }

    /// Whether the secondary zone slot is legal at this table size.
    #[must_use]
    pub fn secondary_slot_allowed(&self) -> bool {
        self.seats.len() >= self.secondary_slot_min_players
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let count = self.seats.len();
        if !(2..=6).contains(&count) {
            return Err(ConfigError::PlayerCount { count });
        }
        if self.victory_points_goal == 0 {
            return Err(ConfigError::ZeroVictoryGoal);
        }
        if self.secondary_slot_min_players < 2 {
            return Err(ConfigError::SecondaryThreshold {
                value: self.secondary_slot_min_players,
            });
        }
        for (&phase, &dwell) in &self.min_dwell_ms {
            if dwell > 60_000 {
                return Err(ConfigError::DwellTooLong { phase, dwell });
            }
        }
        Ok(())
    }
}

/// Errors raised when match configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("player count must be between 2 and 6 (got {count})")]
    PlayerCount { count: usize },
    #[error("victory point goal must be positive")]
    ZeroVictoryGoal,
    #[error("secondary slot threshold must be at least 2 (got {value})")]
    SecondaryThreshold { value: usize },
    #[error("minimum dwell for {phase:?} exceeds 60s ({dwell}ms)")]
    DwellTooLong { phase: Phase, dwell: u64 },
}
