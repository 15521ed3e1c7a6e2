//! Yield-decision flow.
//!
//! When an attack lands on zone occupants, each damaged defender receives a
//! prompt asking whether to yield the slot or stay. Human and autonomous
//! defenders go through the same prompt structure; autonomous ones are
//! decided synchronously while the prompt is created, humans leave theirs
//! pending until the outer layer supplies an answer. The batch is complete
//! only when every prompt carries a decision, a structural check rather than a
//! counter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{EventKind, EventSeverity};
use crate::player::PlayerId;
use crate::rng::RngSuite;
use crate::state::GameState;
use crate::strategy::{Advisory, DecisionProvider, YieldChoice};
use crate::zone::ZoneSlot;

/// One defender's pending or settled yield question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldPrompt {
    pub defender: PlayerId,
    pub attacker: PlayerId,
    pub slot: ZoneSlot,
    pub damage: i32,
    pub advisory: Advisory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<YieldChoice>,
}

/// All prompts spawned by one attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldBatch {
    pub attacker: PlayerId,
    pub turn_cycle_id: u64,
    pub prompts: Vec<YieldPrompt>,
}

impl YieldBatch {
    /// Complete iff every prompt has a decision recorded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.prompts.iter().all(|p| p.decision.is_some())
    }

    /// Defenders still owing an answer.
    #[must_use]
    pub fn undecided(&self) -> Vec<PlayerId> {
        self.prompts
            .iter()
            .filter(|p| p.decision.is_none())
            .map(|p| p.defender)
            .collect()
    }

    /// Defenders whose prompts are already settled.
    #[must_use]
    pub fn decided(&self) -> Vec<PlayerId> {
        self.prompts
            .iter()
            .filter(|p| p.decision.is_some())
            .map(|p| p.defender)
            .collect()
    }

    #[must_use]
    pub fn prompt_for(&self, defender: PlayerId) -> Option<&YieldPrompt> {
        self.prompts.iter().find(|p| p.defender == defender)
    }
}

/// Rejections for an externally supplied yield answer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum YieldError {
    #[error("no yield batch is active")]
    NoActiveBatch,
    #[error("player {player:?} has no prompt in the active batch")]
    NoPromptForPlayer { player: PlayerId },
    #[error("player {player:?} already answered this prompt")]
    AlreadyDecided { player: PlayerId },
}

/// Create prompts for every living zone occupant hit by the attack, resolve
/// the autonomous ones synchronously, and install the batch on the state.
/// Returns the number of prompts created; zero means no batch was installed
/// and the caller proceeds straight to zone entry.
pub fn begin_yield_flow(
    state: &mut GameState,
    provider: &dyn DecisionProvider,
    rng: &RngSuite,
    attacker: PlayerId,
    damage: i32,
) -> usize {
    let secondary_allowed = state.secondary_slot_allowed();
    let defenders: Vec<(ZoneSlot, PlayerId)> = state
        .zone
        .occupied_slots(secondary_allowed)
        .into_iter()
        .filter(|(_, id)| *id != attacker)
        .filter(|(_, id)| state.roster.get(*id).is_some_and(|p| p.alive))
        .collect();
    if defenders.is_empty() {
        return 0;
    }

    let turn = state.turn.turn_cycle_id;
    let mut prompts = Vec::with_capacity(defenders.len());
    for (index, (slot, defender)) in defenders.iter().enumerate() {
        let mut advisory = provider.evaluate_yield_advisory(state, *defender, damage, *slot);
        // The engine, not the provider, owns seed tagging.
        advisory.seed = rng.decision_seed("yield", turn, index as u32, *defender);
        prompts.push(YieldPrompt {
            defender: *defender,
            attacker,
            slot: *slot,
            damage,
            advisory,
            decision: None,
        });
    }
    state.push_event(
        EventKind::YieldPromptsCreated,
        EventSeverity::Info,
        serde_json::json!({
            "attacker": attacker.0,
            "defenders": prompts.iter().map(|p| p.defender.0).collect::<Vec<_>>(),
        }),
    );

    for (index, prompt) in prompts.iter_mut().enumerate() {
        let autonomous = state
            .roster
            .get(prompt.defender)
            .is_some_and(|p| p.autonomous);
        if !autonomous {
            continue;
        }
        let mut decision_rng = rng.decision_rng("yield", turn, index as u32, prompt.defender);
        let choice = provider.evaluate_yield_decision(
            state,
            prompt.defender,
            damage,
            prompt.slot,
            Some(&mut decision_rng),
        );
        prompt.decision = Some(choice);
    }
    for prompt in &prompts {
        if let Some(choice) = prompt.decision {
            apply_choice(state, prompt.defender, choice);
        }
    }

    let batch = YieldBatch {
        attacker,
        turn_cycle_id: turn,
        prompts,
    };
    let count = batch.prompts.len();
    emit_flow_status(state, &batch);
    state.yield_batch = Some(batch);
    count
}

/// Record a human defender's answer on the active batch. Returns true when
/// the batch is complete afterwards.
///
/// # Errors
///
/// Rejects answers with no active batch, from players without a prompt, and
/// repeats of an already-settled prompt.
pub fn resolve_prompt(
    state: &mut GameState,
    defender: PlayerId,
    choice: YieldChoice,
) -> Result<bool, YieldError> {
    let Some(mut batch) = state.yield_batch.take() else {
        return Err(YieldError::NoActiveBatch);
    };
    let Some(prompt) = batch.prompts.iter_mut().find(|p| p.defender == defender) else {
        state.yield_batch = Some(batch);
        return Err(YieldError::NoPromptForPlayer { player: defender });
    };
    if prompt.decision.is_some() {
        state.yield_batch = Some(batch);
        return Err(YieldError::AlreadyDecided { player: defender });
    }
    prompt.decision = Some(choice);
    apply_choice(state, defender, choice);
    let complete = batch.is_complete();
    emit_flow_status(state, &batch);
    state.yield_batch = Some(batch);
    Ok(complete)
}

fn apply_choice(state: &mut GameState, defender: PlayerId, choice: YieldChoice) {
    state.push_event(
        EventKind::YieldDecisionRecorded,
        EventSeverity::Info,
        serde_json::json!({ "defender": defender.0, "choice": choice }),
    );
    if choice == YieldChoice::Yield
        && let Some(slot) = state.zone.vacate(defender)
    {
        state.push_event(
            EventKind::ZoneVacated,
            EventSeverity::Info,
            serde_json::json!({ "player": defender.0, "slot": slot }),
        );
    }
}

fn emit_flow_status(state: &mut GameState, batch: &YieldBatch) {
    if batch.is_complete() {
        state.push_event(
            EventKind::YieldFlowComplete,
            EventSeverity::Info,
            serde_json::json!({ "attacker": batch.attacker.0 }),
        );
    } else {
        state.push_event(
            EventKind::YieldFlowPartial,
            EventSeverity::Info,
            serde_json::json!({
                "attacker": batch.attacker.0,
                "resolved": batch.decided().iter().map(|id| id.0).collect::<Vec<_>>(),
                "pending": batch.undecided().iter().map(|id| id.0).collect::<Vec<_>>(),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeterminismMode, GameConfig, SeatConfig};
    use crate::strategy::ScriptedProvider;

    fn seeded_suite() -> RngSuite {
        RngSuite::new(DeterminismMode::Seeded(0xC0FFEE))
    }

    fn state_with_occupant(human_defender: bool) -> GameState {
        let defender = if human_defender {
            SeatConfig::human("Defender")
        } else {
            SeatConfig::cpu("Defender")
        };
        let mut state = GameState::new(GameConfig::new(vec![
            SeatConfig::cpu("Attacker"),
            defender,
            SeatConfig::cpu("Bystander"),
        ]));
        state.zone.enter(ZoneSlot::Primary, PlayerId(1));
        state
    }

    #[test]
    fn autonomous_defender_resolves_synchronously() {
        let mut state = state_with_occupant(false);
        let mut provider = ScriptedProvider::new();
        provider.set_yield(PlayerId(1), YieldChoice::Yield);
        let count = begin_yield_flow(&mut state, &provider, &seeded_suite(), PlayerId(0), 3);
        assert_eq!(count, 1);
        assert!(!state.yield_pending());
        assert!(state.zone.is_empty());
    }

    #[test]
    fn human_prompt_stays_pending_until_answered() {
        let mut state = state_with_occupant(true);
        let provider = ScriptedProvider::new();
        let count = begin_yield_flow(&mut state, &provider, &seeded_suite(), PlayerId(0), 2);
        assert_eq!(count, 1);
        assert!(state.yield_pending());

        let complete = resolve_prompt(&mut state, PlayerId(1), YieldChoice::Stay).expect("answer");
        assert!(complete);
        assert!(!state.yield_pending());
        assert_eq!(state.zone.primary, Some(PlayerId(1)));
    }

    #[test]
    fn repeated_answer_is_rejected() {
        let mut state = state_with_occupant(true);
        let provider = ScriptedProvider::new();
        begin_yield_flow(&mut state, &provider, &seeded_suite(), PlayerId(0), 2);
        resolve_prompt(&mut state, PlayerId(1), YieldChoice::Yield).expect("first answer");
        assert_eq!(
            resolve_prompt(&mut state, PlayerId(1), YieldChoice::Stay),
            Err(YieldError::AlreadyDecided { player: PlayerId(1) })
        );
    }

    #[test]
    fn answer_without_prompt_is_rejected() {
        let mut state = state_with_occupant(true);
        let provider = ScriptedProvider::new();
        begin_yield_flow(&mut state, &provider, &seeded_suite(), PlayerId(0), 2);
        assert_eq!(
            resolve_prompt(&mut state, PlayerId(2), YieldChoice::Yield),
            Err(YieldError::NoPromptForPlayer { player: PlayerId(2) })
        );
    }

    #[test]
    fn empty_zone_creates_no_batch() {
        let mut state = GameState::new(GameConfig::new(vec![
            SeatConfig::cpu("A"),
            SeatConfig::cpu("B"),
        ]));
        let provider = ScriptedProvider::new();
        let count = begin_yield_flow(&mut state, &provider, &seeded_suite(), PlayerId(0), 1);
        assert_eq!(count, 0);
        assert!(state.yield_batch.is_none());
    }

    #[test]
    fn partial_flow_event_lists_resolved_and_pending_defenders() {
        let mut state = GameState::new(GameConfig::new(vec![
            SeatConfig::cpu("Attacker"),
            SeatConfig::human("Holder"),
            SeatConfig::cpu("Lurker"),
            SeatConfig::cpu("D"),
            SeatConfig::cpu("E"),
        ]));
        state.zone.enter(ZoneSlot::Primary, PlayerId(1));
        state.zone.enter(ZoneSlot::Secondary, PlayerId(2));
        let mut provider = ScriptedProvider::new();
        provider.set_yield(PlayerId(2), YieldChoice::Stay);
        begin_yield_flow(&mut state, &provider, &seeded_suite(), PlayerId(0), 2);

        let partial = state
            .events()
            .iter()
            .find(|e| e.kind == crate::event::EventKind::YieldFlowPartial)
            .expect("partial event");
        assert_eq!(partial.payload["resolved"], serde_json::json!([2]));
        assert_eq!(partial.payload["pending"], serde_json::json!([1]));
    }

    #[test]
    fn seeded_mode_tags_prompt_advisories() {
        let mut state = state_with_occupant(true);
        let provider = ScriptedProvider::new();
        begin_yield_flow(&mut state, &provider, &seeded_suite(), PlayerId(0), 2);
        let batch = state.yield_batch.as_ref().expect("batch");
        assert!(batch.prompt_for(PlayerId(1)).expect("prompt").advisory.seed.is_some());
    }
}
