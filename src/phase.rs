//! Guarded phase state machine.
//!
//! The machine is the single authority on "what phase are we in". Every
//! transition request is validated against a static edge table plus a guard
//! evaluated on live game state; failures never mutate the phase and never
//! panic; callers receive a typed outcome they must check.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Turn phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Roll,
    Resolve,
    YieldDecision,
    Buy,
    BuyWait,
    Cleanup,
    GameOver,
}

/// Named signal that can drive a transition from the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseTrigger {
    GameStart,
    DiceSequenceComplete,
    YieldPromptsPending,
    ResolutionSettled,
    VictoryMet,
    AllYieldDecided,
    TakeoverRecheck,
    EffectEnqueued,
    BuyWindowClosed,
    EffectQueueIdle,
    NextTurnReady,
}

/// Guard predicate attached to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guard {
    StartSignaled,
    DiceComplete,
    YieldPending,
    /// Resolution applied and no yield prompt outstanding.
    ResolutionSettled,
    VictoryMet,
    AllYieldDecided,
    EffectsPending,
    EffectsIdle,
    Always,
}

/// Live-state snapshot the guards evaluate against. Guards always see the
/// most recently committed state, never a stale copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardContext {
    pub start_signaled: bool,
    pub dice_sequence_complete: bool,
    pub resolution_applied: bool,
    pub yield_pending: bool,
    pub victory_met: bool,
    pub effects_pending: bool,
    pub now_ms: u64,
    pub turn_cycle_id: u64,
}

impl Guard {
    const fn evaluate(self, ctx: &GuardContext) -> bool {
        match self {
            Self::StartSignaled => ctx.start_signaled,
            Self::DiceComplete => ctx.dice_sequence_complete,
            Self::YieldPending => ctx.yield_pending,
            Self::ResolutionSettled => ctx.resolution_applied && !ctx.yield_pending,
            Self::VictoryMet => ctx.victory_met,
            Self::AllYieldDecided => !ctx.yield_pending,
            Self::EffectsPending => ctx.effects_pending,
            Self::EffectsIdle => !ctx.effects_pending,
            Self::Always => true,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::StartSignaled => "start_signaled",
            Self::DiceComplete => "dice_complete",
            Self::YieldPending => "yield_pending",
            Self::ResolutionSettled => "resolution_settled",
            Self::VictoryMet => "victory_met",
            Self::AllYieldDecided => "all_yield_decided",
            Self::EffectsPending => "effects_pending",
            Self::EffectsIdle => "effects_idle",
            Self::Always => "always",
        }
    }
}

/// Static edge table: (from, to, guard, trigger).
const EDGES: &[(Phase, Phase, Guard, PhaseTrigger)] = &[
    (
        Phase::Setup,
        Phase::Roll,
        Guard::StartSignaled,
        PhaseTrigger::GameStart,
    ),
    (
        Phase::Roll,
        Phase::Resolve,
        Guard::DiceComplete,
        PhaseTrigger::DiceSequenceComplete,
    ),
    (
        Phase::Resolve,
        Phase::YieldDecision,
        Guard::YieldPending,
        PhaseTrigger::YieldPromptsPending,
    ),
    (
        Phase::Resolve,
        Phase::Buy,
        Guard::ResolutionSettled,
        PhaseTrigger::ResolutionSettled,
    ),
    (
        Phase::Resolve,
        Phase::GameOver,
        Guard::VictoryMet,
        PhaseTrigger::VictoryMet,
    ),
    // Holding the zone at turn start can push a player over the goal.
    (
        Phase::Roll,
        Phase::GameOver,
        Guard::VictoryMet,
        PhaseTrigger::VictoryMet,
    ),
    (
        Phase::YieldDecision,
        Phase::Buy,
        Guard::AllYieldDecided,
        PhaseTrigger::AllYieldDecided,
    ),
    (
        Phase::YieldDecision,
        Phase::Resolve,
        Guard::AllYieldDecided,
        PhaseTrigger::TakeoverRecheck,
    ),
    (
        Phase::Buy,
        Phase::BuyWait,
        Guard::EffectsPending,
        PhaseTrigger::EffectEnqueued,
    ),
    (
        Phase::Buy,
        Phase::Cleanup,
        Guard::EffectsIdle,
        PhaseTrigger::BuyWindowClosed,
    ),
    (
        Phase::BuyWait,
        Phase::Cleanup,
        Guard::EffectsIdle,
        PhaseTrigger::EffectQueueIdle,
    ),
    (
        Phase::Cleanup,
        Phase::Roll,
        Guard::Always,
        PhaseTrigger::NextTurnReady,
    ),
];

/// Appended to history once per applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: Phase,
    pub to: Phase,
    pub at_ms: u64,
    pub turn_cycle_id: u64,
    pub reason: String,
}

/// Why a transition request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("no edge from {from:?} to {to:?}")]
    NoEdge { from: Phase, to: Phase },
    #[error("guard {guard} failed for {from:?} -> {to:?}")]
    GuardFailed {
        from: Phase,
        to: Phase,
        guard: &'static str,
    },
    #[error("{phase:?} is terminal")]
    Terminal { phase: Phase },
    #[error("no edge from {from:?} matches trigger {trigger:?}")]
    NoTriggerEdge { from: Phase, trigger: PhaseTrigger },
}

/// Result of a transition request. Callers must check it; nothing throws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Edge validated and applied; the record was appended to history.
    Applied(TransitionRecord),
    /// Self-transition: success, but no history entry.
    Skipped,
    /// Minimum dwell for the current phase has not elapsed.
    Deferred { remaining_ms: u64 },
    /// Edge missing or guard false; phase unchanged.
    Rejected(TransitionError),
}

impl TransitionOutcome {
    /// Applied or skipped both count as success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Applied(_) | Self::Skipped)
    }
}

/// The phase authority.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    current: Phase,
    entered_at_ms: u64,
    min_dwell_ms: HashMap<Phase, u64>,
    history: Vec<TransitionRecord>,
}

impl PhaseMachine {
    #[must_use]
    pub fn new(min_dwell_ms: HashMap<Phase, u64>) -> Self {
        Self {
            current: Phase::Setup,
            entered_at_ms: 0,
            min_dwell_ms,
            history: Vec::new(),
        }
    }

    #[must_use]
    pub const fn current(&self) -> Phase {
        self.current
    }

    #[must_use]
    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Request a transition to `target`.
    ///
    /// Self-transitions are a no-op success. Illegal requests are rejected
    /// without mutating phase state; a warning is logged and the caller gets
    /// the typed failure.
    pub fn to(&mut self, target: Phase, ctx: &GuardContext, reason: &str) -> TransitionOutcome {
        if target == self.current {
            log::debug!("phase self-transition to {target:?} skipped");
            return TransitionOutcome::Skipped;
        }
        if self.current == Phase::GameOver {
            log::warn!("transition out of terminal phase refused");
            return TransitionOutcome::Rejected(TransitionError::Terminal {
                phase: Phase::GameOver,
            });
        }
        if let Some(&dwell) = self.min_dwell_ms.get(&self.current) {
            let elapsed = ctx.now_ms.saturating_sub(self.entered_at_ms);
            if elapsed < dwell {
                return TransitionOutcome::Deferred {
                    remaining_ms: dwell - elapsed,
                };
            }
        }
        let Some((_, _, guard, _)) = EDGES
            .iter()
            .find(|(from, to, _, _)| *from == self.current && *to == target)
        else {
            log::warn!("no edge {:?} -> {target:?}", self.current);
            return TransitionOutcome::Rejected(TransitionError::NoEdge {
                from: self.current,
                to: target,
            });
        };
        if !guard.evaluate(ctx) {
            log::warn!(
                "guard {} blocked {:?} -> {target:?}",
                guard.name(),
                self.current
            );
            return TransitionOutcome::Rejected(TransitionError::GuardFailed {
                from: self.current,
                to: target,
                guard: guard.name(),
            });
        }
        let record = TransitionRecord {
            from: self.current,
            to: target,
            at_ms: ctx.now_ms,
            turn_cycle_id: ctx.turn_cycle_id,
            reason: reason.to_string(),
        };
        log::info!("phase {:?} -> {target:?} ({reason})", self.current);
        self.current = target;
        self.entered_at_ms = ctx.now_ms;
        self.history.push(record.clone());
        TransitionOutcome::Applied(record)
    }

    /// Apply a transition unconditionally, bypassing the edge table, guards,
    /// and dwell. Reserved for the bounded-retry start path, where staying
    /// wedged in setup is worse than an unvalidated entry into the first
    /// turn.
    pub fn force_to(&mut self, target: Phase, ctx: &GuardContext, reason: &str) -> TransitionOutcome {
        if target == self.current {
            return TransitionOutcome::Skipped;
        }
        let record = TransitionRecord {
            from: self.current,
            to: target,
            at_ms: ctx.now_ms,
            turn_cycle_id: ctx.turn_cycle_id,
            reason: reason.to_string(),
        };
        log::warn!("forced phase {:?} -> {target:?} ({reason})", self.current);
        self.current = target;
        self.entered_at_ms = ctx.now_ms;
        self.history.push(record.clone());
        TransitionOutcome::Applied(record)
    }

    /// Resolve the edge whose declared trigger matches the current phase and
    /// delegate to [`Self::to`].
    pub fn trigger(&mut self, trigger: PhaseTrigger, ctx: &GuardContext) -> TransitionOutcome {
        let Some((_, target, _, _)) = EDGES
            .iter()
            .find(|(from, _, _, t)| *from == self.current && *t == trigger)
        else {
            log::warn!("trigger {trigger:?} has no edge from {:?}", self.current);
            return TransitionOutcome::Rejected(TransitionError::NoTriggerEdge {
                from: self.current,
                trigger,
            });
        };
        let target = *target;
        self.to(target, ctx, trigger_reason(trigger))
    }
}

const fn trigger_reason(trigger: PhaseTrigger) -> &'static str {
    match trigger {
        PhaseTrigger::GameStart => "game_start",
        PhaseTrigger::DiceSequenceComplete => "dice_sequence_complete",
        PhaseTrigger::YieldPromptsPending => "yield_prompts_pending",
        PhaseTrigger::ResolutionSettled => "resolution_settled",
        PhaseTrigger::VictoryMet => "victory_met",
        PhaseTrigger::AllYieldDecided => "all_yield_decided",
        PhaseTrigger::TakeoverRecheck => "takeover_recheck",
        PhaseTrigger::EffectEnqueued => "effect_enqueued",
        PhaseTrigger::BuyWindowClosed => "buy_window_closed",
        PhaseTrigger::EffectQueueIdle => "effect_queue_idle",
        PhaseTrigger::NextTurnReady => "next_turn_ready",
    }
}
