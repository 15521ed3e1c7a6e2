//! Decision provider seam for autonomous play and yield advisories.
//!
//! The engine depends only on these signatures and on the providers
//! returning synchronously; the scoring heuristics behind them are
//! deliberately pluggable.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use crate::dice::Face;
use crate::player::PlayerId;
use crate::rng::EngineRng;
use crate::state::GameState;
use crate::zone::ZoneSlot;

/// What to do with the current roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollAction {
    Reroll,
    EndRoll,
}

/// Roll evaluation returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollDecision {
    pub action: RollAction,
    /// Dice indices to keep across the next reroll.
    pub keep: Vec<usize>,
    pub confidence: f32,
}

/// A damaged occupant's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldChoice {
    Yield,
    Stay,
}

/// Non-binding recommendation attached to a yield prompt. Carried by the
/// engine, interpreted only by the presentation layer; the engine tags the
/// deterministic decision seed when one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub recommendation: YieldChoice,
    pub score: f32,
}

/// Pluggable strategy consulted by the orchestrator and the yield flow.
pub trait DecisionProvider {
    /// Evaluate the active player's roll: which dice to keep and whether to
    /// spend another reroll.
    fn evaluate_roll(
        &self,
        state: &GameState,
        player: PlayerId,
        rolls_remaining: u8,
    ) -> RollDecision;

    /// Advisory recommendation for a defender's yield prompt.
    fn evaluate_yield_advisory(
        &self,
        state: &GameState,
        defender: PlayerId,
        damage: i32,
        slot: ZoneSlot,
    ) -> Advisory;

    /// Binding decision for an autonomous defender.
    fn evaluate_yield_decision(
        &self,
        state: &GameState,
        defender: PlayerId,
        damage: i32,
        slot: ZoneSlot,
        rng: Option<&mut EngineRng>,
    ) -> YieldChoice;
}

/// Default strategy: keep attacks and the strongest numeric set, reroll
/// while credits remain, vacate the zone when health runs low.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyProvider;

impl GreedyProvider {
    fn keep_indices(faces: &[Face]) -> Vec<usize> {
        // Strongest numeric value worth chasing: the one with the most dice,
        // ties broken toward the higher value.
        let mut best_value = None;
        let mut best_count = 0;
        for value in [Face::One, Face::Two, Face::Three] {
            let count = faces.iter().filter(|&&f| f == value).count();
            if count >= best_count && count >= 2 {
                best_value = Some(value);
                best_count = count;
            }
        }
        faces
            .iter()
            .enumerate()
            .filter(|&(_, &face)| face == Face::Attack || Some(face) == best_value)
            .map(|(index, _)| index)
            .collect()
    }
}

impl DecisionProvider for GreedyProvider {
    fn evaluate_roll(
        &self,
        state: &GameState,
        _player: PlayerId,
        rolls_remaining: u8,
    ) -> RollDecision {
        let keep = Self::keep_indices(&state.dice.faces);
        let all_kept = keep.len() == state.dice.faces.len();
        let action = if rolls_remaining == 0 || all_kept {
            RollAction::EndRoll
        } else {
            RollAction::Reroll
        };
        let confidence = keep.len() as f32 / state.dice.faces.len().max(1) as f32;
        RollDecision {
            action,
            keep,
            confidence,
        }
    }

    fn evaluate_yield_advisory(
        &self,
        state: &GameState,
        defender: PlayerId,
        damage: i32,
        slot: ZoneSlot,
    ) -> Advisory {
        let choice = self.evaluate_yield_decision(state, defender, damage, slot, None);
        Advisory {
            seed: None,
            recommendation: choice,
            score: if choice == YieldChoice::Yield { 1.0 } else { 0.0 },
        }
    }

    fn evaluate_yield_decision(
        &self,
        state: &GameState,
        defender: PlayerId,
        damage: i32,
        _slot: ZoneSlot,
        rng: Option<&mut EngineRng>,
    ) -> YieldChoice {
        let Some(player) = state.roster.get(defender) else {
            return YieldChoice::Stay;
        };
        // Staying risks eating the same hit again next turn.
        if player.health <= damage {
            return YieldChoice::Yield;
        }
        if player.health <= damage + 2 {
            // Marginal zone: coin flip when a generator is supplied,
            // otherwise hold the slot.
            if let Some(rng) = rng
                && rng.gen_bool(0.5)
            {
                return YieldChoice::Yield;
            }
            return YieldChoice::Stay;
        }
        YieldChoice::Stay
    }
}

/// Test double replaying queued roll decisions and fixed yield choices.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    rolls: RefCell<VecDeque<RollDecision>>,
    yields: HashMap<PlayerId, YieldChoice>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_roll(&self, decision: RollDecision) {
        self.rolls.borrow_mut().push_back(decision);
    }

    pub fn set_yield(&mut self, player: PlayerId, choice: YieldChoice) {
        self.yields.insert(player, choice);
    }
}

impl DecisionProvider for ScriptedProvider {
    fn evaluate_roll(
        &self,
        _state: &GameState,
        _player: PlayerId,
        _rolls_remaining: u8,
    ) -> RollDecision {
        self.rolls.borrow_mut().pop_front().unwrap_or(RollDecision {
            action: RollAction::EndRoll,
            keep: Vec::new(),
            confidence: 1.0,
        })
    }

    fn evaluate_yield_advisory(
        &self,
        _state: &GameState,
        defender: PlayerId,
        _damage: i32,
        _slot: ZoneSlot,
    ) -> Advisory {
        Advisory {
            seed: None,
            recommendation: self
                .yields
                .get(&defender)
                .copied()
                .unwrap_or(YieldChoice::Stay),
            score: 1.0,
        }
    }

    fn evaluate_yield_decision(
        &self,
        _state: &GameState,
        defender: PlayerId,
        _damage: i32,
        _slot: ZoneSlot,
        _rng: Option<&mut EngineRng>,
    ) -> YieldChoice {
        self.yields
            .get(&defender)
            .copied()
            .unwrap_or(YieldChoice::Stay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_keeps_attacks_and_best_numeric_run() {
        let faces = [
            Face::Attack,
            Face::Two,
            Face::Two,
            Face::Heart,
            Face::Energy,
            Face::Attack,
        ];
        let keep = GreedyProvider::keep_indices(&faces);
        assert_eq!(keep, vec![0, 1, 2, 5]);
    }

    #[test]
    fn greedy_ignores_singleton_numerics() {
        let faces = [
            Face::One,
            Face::Two,
            Face::Three,
            Face::Heart,
            Face::Energy,
            Face::Heart,
        ];
        assert!(GreedyProvider::keep_indices(&faces).is_empty());
    }

    #[test]
    fn scripted_provider_replays_in_order() {
        let provider = ScriptedProvider::new();
        provider.push_roll(RollDecision {
            action: RollAction::Reroll,
            keep: vec![1],
            confidence: 0.5,
        });
        let state = crate::state::GameState::new(crate::config::GameConfig::new(vec![
            crate::config::SeatConfig::cpu("A"),
            crate::config::SeatConfig::cpu("B"),
        ]));
        let first = provider.evaluate_roll(&state, PlayerId(0), 2);
        assert_eq!(first.action, RollAction::Reroll);
        let second = provider.evaluate_roll(&state, PlayerId(0), 1);
        assert_eq!(second.action, RollAction::EndRoll);
    }
}
