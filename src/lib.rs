//! Kaiju Arena Engine
//!
//! Platform-agnostic turn orchestration for a monster-arena dice game.
//! This crate provides the phase machine, dice resolution, yield flow, and
//! autonomous-play scheduling without UI or platform-specific dependencies.

pub mod config;
pub mod constants;
pub mod dice;
pub mod drift;
pub mod effects;
pub mod event;
pub mod orchestrator;
pub mod phase;
pub mod player;
pub mod resolve;
pub mod rng;
pub mod schedule;
pub mod state;
pub mod strategy;
pub mod yield_decision;
pub mod zone;

// Re-export commonly used types
pub use config::{ConfigError, CpuSpeed, DeterminismMode, GameConfig, SeatConfig};
pub use dice::{DicePhase, DiceState, Face, FaceSet, KeepSet, triple_score};
pub use drift::{DriftDetector, PlayerSnapshot, TurnSnapshot};
pub use effects::{EffectQueue, EffectQueueEntry, EffectStatus};
pub use event::{EngineEvent, EventKind, EventSeverity};
pub use orchestrator::{EngineError, StartOutcome, TurnOrchestrator};
pub use phase::{
    GuardContext, Phase, PhaseMachine, PhaseTrigger, TransitionError, TransitionOutcome,
    TransitionRecord,
};
pub use player::{Player, PlayerId, Roster};
pub use resolve::{
    ModifierError, NoModifiers, PassiveModifier, ResolutionSummary, apply_resolution,
    sweep_eliminations, try_zone_entry,
};
pub use rng::{EngineRng, RngSuite, SeedPart, combine_seed, derive_decision_seed, derive_turn_seed};
pub use schedule::{DueTask, StaleTask, TaskId, TaskKind, TaskScheduler};
pub use state::{GameState, TurnCycle, VictoryKind};
pub use strategy::{
    Advisory, DecisionProvider, GreedyProvider, RollAction, RollDecision, ScriptedProvider,
    YieldChoice,
};
pub use yield_decision::{YieldBatch, YieldError, YieldPrompt, begin_yield_flow, resolve_prompt};
pub use zone::{ZoneSlot, ZoneState};
