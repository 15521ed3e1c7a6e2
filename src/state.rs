//! Match state aggregate.
//!
//! Owned exclusively by the orchestrator and the resolution engine; external
//! collaborators read it or signal intent via discrete messages, never
//! mutate it directly.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::dice::DiceState;
use crate::effects::EffectQueue;
use crate::event::{EngineEvent, EventKind, EventSeverity};
use crate::phase::GuardContext;
use crate::player::{PlayerId, Roster};
use crate::yield_decision::YieldBatch;
use crate::zone::{ZoneSlot, ZoneState};

/// Turn epoch. `turn_cycle_id` increments exactly once per completed turn
/// and invalidates any asynchronous continuation scheduled under an earlier
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TurnCycle {
    pub turn_cycle_id: u64,
    pub active_player_index: usize,
}

/// How the match was won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryKind {
    PointsGoal,
    LastStanding,
}

/// Full mutable match state.
#[derive(Debug, Clone)]
pub struct GameState {
    pub config: GameConfig,
    pub roster: Roster,
    pub zone: ZoneState,
    pub dice: DiceState,
    pub turn: TurnCycle,
    /// At most one active batch; its completion gates the yield phase exit.
    pub yield_batch: Option<YieldBatch>,
    pub effect_queue: EffectQueue,
    pub winner: Option<(PlayerId, VictoryKind)>,
    pub started: bool,
    pub start_signaled: bool,
    pub start_attempts: u8,
    events: Vec<EngineEvent>,
    event_seq: u64,
}

impl GameState {
    #[must_use]
    pub fn new(config: GameConfig) -> Self {
        let roster = Roster::from_seats(&config.seats);
        Self {
            config,
            roster,
            zone: ZoneState::default(),
            dice: DiceState::default(),
            turn: TurnCycle::default(),
            yield_batch: None,
            effect_queue: EffectQueue::default(),
            winner: None,
            started: false,
            start_signaled: false,
            start_attempts: 0,
            events: Vec::new(),
            event_seq: 0,
        }
    }

    /// The player whose turn it is.
    #[must_use]
    pub fn active_player_id(&self) -> Option<PlayerId> {
        self.roster
            .by_index(self.turn.active_player_index)
            .map(|p| p.id)
    }

    /// Zone slot held by a player, if any.
    #[must_use]
    pub fn zone_location(&self, player: PlayerId) -> Option<ZoneSlot> {
        self.zone.slot_of(player)
    }

    /// Whether a player occupies either zone slot.
    #[must_use]
    pub fn in_zone(&self, player: PlayerId) -> bool {
        self.zone.contains(player)
    }

    /// Whether the secondary slot is legal at this table size.
    #[must_use]
    pub fn secondary_slot_allowed(&self) -> bool {
        self.config.secondary_slot_allowed()
    }

    /// Whether a yield batch exists with undecided prompts.
    #[must_use]
    pub fn yield_pending(&self) -> bool {
        self.yield_batch
            .as_ref()
            .is_some_and(|batch| !batch.is_complete())
    }

    /// Victory check: points goal first, then sole survivor.
    #[must_use]
    pub fn check_victory(&self) -> Option<(PlayerId, VictoryKind)> {
        if let Some(player) = self
            .roster
            .living()
            .find(|p| p.victory_points >= self.config.victory_points_goal)
        {
            return Some((player.id, VictoryKind::PointsGoal));
        }
        self.roster
            .sole_survivor()
            .map(|id| (id, VictoryKind::LastStanding))
    }

    /// Guard snapshot over the most recently committed state.
    #[must_use]
    pub fn guard_context(&self, now_ms: u64) -> GuardContext {
        GuardContext {
            start_signaled: self.start_signaled,
            dice_sequence_complete: self.dice.sequence_complete(),
            resolution_applied: self.dice.accepted,
            yield_pending: self.yield_pending(),
            victory_met: self.winner.is_some(),
            effects_pending: !self.effect_queue.is_idle(),
            now_ms,
            turn_cycle_id: self.turn.turn_cycle_id,
        }
    }

    /// Append a structured event stamped with the current turn epoch.
    pub fn push_event(&mut self, kind: EventKind, severity: EventSeverity, payload: serde_json::Value) {
        let event = EngineEvent {
            seq: self.event_seq,
            turn_cycle_id: self.turn.turn_cycle_id,
            kind,
            severity,
            payload,
        };
        log::debug!("event {:?} seq={}", event.kind, event.seq);
        self.event_seq += 1;
        self.events.push(event);
    }

    #[must_use]
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Drain events accumulated since the last call (for the external state
    /// container to consume).
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}
