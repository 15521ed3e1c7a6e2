//! Replay drift detection for seeded matches.
//!
//! A seeded match must reproduce bit-identically. The detector captures a
//! compact snapshot at each turn boundary; when fed a baseline from an
//! earlier run of the same seed it diffs field-by-field and reports the
//! first divergence instead of letting it surface turns later as an
//! inexplicable outcome.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dice::Face;
use crate::event::{EventKind, EventSeverity};
use crate::phase::Phase;
use crate::player::PlayerId;
use crate::state::GameState;
use crate::zone::ZoneState;

/// Per-player slice of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub health: i32,
    pub energy: u32,
    pub victory_points: u32,
    pub alive: bool,
}

/// Match state captured at a turn boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    pub turn_cycle_id: u64,
    pub phase: Phase,
    pub active_player: Option<PlayerId>,
    pub zone: ZoneState,
    pub faces: Vec<Face>,
    pub players: Vec<PlayerSnapshot>,
}

impl TurnSnapshot {
    #[must_use]
    pub fn capture(state: &GameState, phase: Phase) -> Self {
        Self {
            turn_cycle_id: state.turn.turn_cycle_id,
            phase,
            active_player: state.active_player_id(),
            zone: state.zone,
            faces: state.dice.faces.to_vec(),
            players: state
                .roster
                .iter()
                .map(|p| PlayerSnapshot {
                    id: p.id,
                    health: p.health,
                    energy: p.energy,
                    victory_points: p.victory_points,
                    alive: p.alive,
                })
                .collect(),
        }
    }

    /// Field-level differences against another snapshot of the same turn.
    #[must_use]
    pub fn diff(&self, other: &Self) -> Vec<String> {
        let mut diffs = Vec::new();
        if self.phase != other.phase {
            diffs.push(format!("phase: {:?} != {:?}", self.phase, other.phase));
        }
        if self.active_player != other.active_player {
            diffs.push(format!(
                "active_player: {:?} != {:?}",
                self.active_player, other.active_player
            ));
        }
        if self.zone != other.zone {
            diffs.push(format!("zone: {:?} != {:?}", self.zone, other.zone));
        }
        if self.faces != other.faces {
            diffs.push(format!("faces: {:?} != {:?}", self.faces, other.faces));
        }
        for (ours, theirs) in self.players.iter().zip(other.players.iter()) {
            if ours.health != theirs.health {
                diffs.push(format!(
                    "player {} health: {} != {}",
                    ours.id.0, ours.health, theirs.health
                ));
            }
            if ours.energy != theirs.energy {
                diffs.push(format!(
                    "player {} energy: {} != {}",
                    ours.id.0, ours.energy, theirs.energy
                ));
            }
            if ours.victory_points != theirs.victory_points {
                diffs.push(format!(
                    "player {} victory_points: {} != {}",
                    ours.id.0, ours.victory_points, theirs.victory_points
                ));
            }
            if ours.alive != theirs.alive {
                diffs.push(format!(
                    "player {} alive: {} != {}",
                    ours.id.0, ours.alive, theirs.alive
                ));
            }
        }
        diffs
    }
}

/// Records snapshots per turn and, when armed with a baseline, reports
/// divergence. Inactive in free mode, where there is no seed to
/// hold the replay to.
#[derive(Debug, Clone, Default)]
pub struct DriftDetector {
    enabled: bool,
    baseline: BTreeMap<u64, TurnSnapshot>,
    recorded: BTreeMap<u64, TurnSnapshot>,
}

impl DriftDetector {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            baseline: BTreeMap::new(),
            recorded: BTreeMap::new(),
        }
    }

    /// Arm the detector with snapshots recorded by an earlier run.
    pub fn set_baseline(&mut self, baseline: BTreeMap<u64, TurnSnapshot>) {
        self.baseline = baseline;
    }

    /// Snapshots recorded so far, for use as a future baseline.
    #[must_use]
    pub fn recorded(&self) -> &BTreeMap<u64, TurnSnapshot> {
        &self.recorded
    }

    /// Capture the turn-boundary snapshot and compare against the baseline.
    /// On divergence a warning event lists the differing fields.
    pub fn observe(&mut self, state: &mut GameState, phase: Phase) {
        if !self.enabled {
            return;
        }
        let snapshot = TurnSnapshot::capture(state, phase);
        let turn = snapshot.turn_cycle_id;
        if let Some(expected) = self.baseline.get(&turn) {
            let diffs = snapshot.diff(expected);
            if !diffs.is_empty() {
                log::warn!("replay drift at turn {turn}: {diffs:?}");
                state.push_event(
                    EventKind::DriftDetected,
                    EventSeverity::Warning,
                    serde_json::json!({ "turn": turn, "fields": diffs }),
                );
            }
        }
        self.recorded.insert(turn, snapshot);
    }
}
