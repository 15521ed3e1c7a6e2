//! Dice resolution engine.
//!
//! Applies an accepted roll to the match state in a fixed step order:
//! triples, energy, healing, attack, zone entry, elimination sweep. The
//! order is load-bearing: healing precedes zone entry so a player entering
//! the zone this turn cannot benefit from hearts rolled on the way in, and
//! eliminations are swept only after all damage has landed.

use thiserror::Error;

use crate::constants::{ATTACK_FACE_THRESHOLD, ZONE_ENTRY_BONUS_VP};
use crate::dice::{triple_score, Face};
use crate::event::{EventKind, EventSeverity};
use crate::player::PlayerId;
use crate::rng::RngSuite;
use crate::state::GameState;
use crate::strategy::DecisionProvider;
use crate::yield_decision::begin_yield_flow;
use crate::zone::ZoneSlot;

/// Failure reported by a passive modifier hook. Hooks are advisory; a
/// failing hook is logged and its bonus treated as zero, never aborting
/// resolution.
#[derive(Debug, Error)]
#[error("modifier '{source_id}' failed: {message}")]
pub struct ModifierError {
    pub source_id: String,
    pub message: String,
}

/// Passive bonuses from owned upgrades, consulted during resolution.
pub trait PassiveModifier {
    /// Extra energy on top of rolled energy faces.
    fn energy_bonus(&self, state: &GameState, player: PlayerId) -> Result<i32, ModifierError> {
        let _ = (state, player);
        Ok(0)
    }

    /// Extra healing on top of rolled hearts.
    fn heal_bonus(&self, state: &GameState, player: PlayerId) -> Result<i32, ModifierError> {
        let _ = (state, player);
        Ok(0)
    }

    /// Extra damage on top of rolled attack faces.
    fn attack_bonus(&self, state: &GameState, player: PlayerId) -> Result<i32, ModifierError> {
        let _ = (state, player);
        Ok(0)
    }
}

/// The no-upgrades baseline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModifiers;

impl PassiveModifier for NoModifiers {}

/// What one resolution pass changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolutionSummary {
    /// False when the latch had already fired and nothing was re-applied.
    pub applied: bool,
    pub victory_points: u32,
    pub energy_gained: i32,
    pub healed: i32,
    pub damage_dealt: i32,
    pub targets: Vec<PlayerId>,
    pub prompts_created: usize,
    pub entered_zone: Option<ZoneSlot>,
    pub eliminated: Vec<PlayerId>,
}

fn modifier_bonus(result: Result<i32, ModifierError>) -> i32 {
    match result {
        Ok(bonus) => bonus,
        Err(err) => {
            log::warn!("passive modifier dropped: {err}");
            0
        }
    }
}

/// Apply the active player's accepted dice to the match state.
///
/// Idempotent: the dice-state latch flips on first application and any
/// repeat call (a double-submit, a replayed continuation) is a no-op.
pub fn apply_resolution(
    state: &mut GameState,
    provider: &dyn DecisionProvider,
    modifiers: &dyn PassiveModifier,
    rng: &RngSuite,
) -> ResolutionSummary {
    if state.dice.accepted {
        log::debug!("resolution already applied this turn, ignoring repeat");
        return ResolutionSummary::default();
    }
    state.dice.accepted = true;

    let mut summary = ResolutionSummary {
        applied: true,
        ..ResolutionSummary::default()
    };
    let Some(actor) = state.active_player_id() else {
        return summary;
    };
    let faces: Vec<Face> = state.dice.faces.iter().copied().collect();
    if faces.is_empty() {
        return summary;
    }
    let actor_in_zone = state.in_zone(actor);

    // 1. Triples.
    summary.victory_points = triple_score(&faces);
    if summary.victory_points > 0
        && let Some(player) = state.roster.get_mut(actor)
    {
        player.victory_points += summary.victory_points;
    }

    // 2. Energy.
    let energy_faces = faces.iter().filter(|&&f| f == Face::Energy).count() as i32;
    summary.energy_gained = energy_faces + modifier_bonus(modifiers.energy_bonus(state, actor));
    if let Some(player) = state.roster.get_mut(actor) {
        player.energy = player.energy.saturating_add_signed(summary.energy_gained);
    }

    // 3. Healing, only outside the zone.
    if !actor_in_zone {
        let hearts = faces.iter().filter(|&&f| f == Face::Heart).count() as i32;
        let heal = hearts + modifier_bonus(modifiers.heal_bonus(state, actor));
        if heal > 0
            && let Some(player) = state.roster.get_mut(actor)
        {
            summary.healed = player.heal(heal);
        }
    }

    // 4. Attack.
    let attack_faces = faces.iter().filter(|&&f| f == Face::Attack).count();
    let attacked = attack_faces >= ATTACK_FACE_THRESHOLD;
    if attacked {
        let damage = attack_faces as i32 + modifier_bonus(modifiers.attack_bonus(state, actor));
        summary.damage_dealt = damage;
        summary.targets = attack_targets(state, actor, actor_in_zone);
        for &target in &summary.targets {
            if let Some(player) = state.roster.get_mut(target) {
                player.apply_damage(damage);
            }
        }
        // Damaged zone occupants may yield their slot.
        if !actor_in_zone {
            summary.prompts_created = begin_yield_flow(state, provider, rng, actor, damage);
        }
    }

    // 5. Zone entry. Without an attack a player may only walk into a fully
    // empty zone; an attack opens the first-open-slot takeover instead.
    if attacked || state.zone.is_empty() {
        summary.entered_zone = try_zone_entry(state, actor);
    }

    // 6. Elimination sweep.
    summary.eliminated = sweep_eliminations(state);

    state.push_event(
        EventKind::ResolutionApplied,
        EventSeverity::Info,
        serde_json::json!({
            "actor": actor.0,
            "victory_points": summary.victory_points,
            "energy": summary.energy_gained,
            "healed": summary.healed,
            "damage": summary.damage_dealt,
            "targets": summary.targets.iter().map(|id| id.0).collect::<Vec<_>>(),
        }),
    );
    summary
}

/// Who the attack hits: occupants hit everyone outside, outsiders hit every
/// (legal) occupant. The attacker never hits themselves.
fn attack_targets(state: &GameState, actor: PlayerId, actor_in_zone: bool) -> Vec<PlayerId> {
    if actor_in_zone {
        state
            .roster
            .living()
            .filter(|p| p.id != actor && !state.in_zone(p.id))
            .map(|p| p.id)
            .collect()
    } else {
        state
            .zone
            .occupied_slots(state.secondary_slot_allowed())
            .into_iter()
            .map(|(_, id)| id)
            .filter(|&id| id != actor && state.roster.get(id).is_some_and(|p| p.alive))
            .collect()
    }
}

/// Move the attacker into the first open slot when nothing blocks it: they
/// must be alive, outside, a slot must be open, and no yield prompt may be
/// pending. Awards the entry bonus. Also used for takeover re-checks after
/// the yield flow settles.
pub fn try_zone_entry(state: &mut GameState, attacker: PlayerId) -> Option<ZoneSlot> {
    if state.yield_pending() || state.in_zone(attacker) {
        return None;
    }
    if !state.roster.get(attacker).is_some_and(|p| p.alive) {
        return None;
    }
    let slot = state.zone.first_open_slot(state.secondary_slot_allowed())?;
    if !state.zone.enter(slot, attacker) {
        return None;
    }
    if let Some(player) = state.roster.get_mut(attacker) {
        player.victory_points += ZONE_ENTRY_BONUS_VP;
    }
    state.push_event(
        EventKind::ZoneEntered,
        EventSeverity::Info,
        serde_json::json!({ "player": attacker.0, "slot": slot }),
    );
    Some(slot)
}

/// Vacate and announce every player that died since the last sweep.
pub fn sweep_eliminations(state: &mut GameState) -> Vec<PlayerId> {
    let dead_in_zone: Vec<PlayerId> = state
        .zone
        .occupied_slots(true)
        .into_iter()
        .map(|(_, id)| id)
        .filter(|&id| !state.roster.get(id).is_some_and(|p| p.alive))
        .collect();
    for id in &dead_in_zone {
        state.zone.vacate(*id);
    }
    let newly_dead: Vec<PlayerId> = state
        .roster
        .iter()
        .filter(|p| !p.alive && !p.elimination_announced)
        .map(|p| p.id)
        .collect();
    for &id in &newly_dead {
        if let Some(player) = state.roster.get_mut(id) {
            player.elimination_announced = true;
        }
        state.push_event(
            EventKind::PlayerEliminated,
            EventSeverity::Info,
            serde_json::json!({ "player": id.0 }),
        );
    }
    newly_dead
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeterminismMode, GameConfig, SeatConfig};
    use crate::constants::MAX_HEALTH;
    use crate::strategy::ScriptedProvider;

    fn suite() -> RngSuite {
        RngSuite::new(DeterminismMode::Seeded(1))
    }

    fn state_of(count: usize) -> GameState {
        let seats: Vec<SeatConfig> = (0..count)
            .map(|i| SeatConfig::cpu(&format!("M{i}")))
            .collect();
        GameState::new(GameConfig::new(seats))
    }

    fn set_faces(state: &mut GameState, faces: &[Face]) {
        state.dice.faces = faces.iter().copied().collect();
        state.dice.kept = std::iter::repeat(false).take(faces.len()).collect();
    }

    #[test]
    fn triples_score_value_plus_surplus() {
        let mut state = state_of(2);
        set_faces(
            &mut state,
            &[Face::Two, Face::Two, Face::Two, Face::Two, Face::Heart, Face::Energy],
        );
        let provider = ScriptedProvider::new();
        let summary = apply_resolution(&mut state, &provider, &NoModifiers, &suite());
        assert_eq!(summary.victory_points, 3);
        assert_eq!(state.roster.get(PlayerId(0)).unwrap().victory_points, 3 + 1);
        // +1 from entering the open zone after resolving.
        assert_eq!(summary.entered_zone, Some(ZoneSlot::Primary));
    }

    #[test]
    fn hearts_heal_only_outside_the_zone() {
        let mut state = state_of(2);
        state.zone.enter(ZoneSlot::Primary, PlayerId(0));
        state.roster.get_mut(PlayerId(0)).unwrap().health = 4;
        set_faces(&mut state, &[Face::Heart, Face::Heart, Face::One, Face::One, Face::Two, Face::Three]);
        let provider = ScriptedProvider::new();
        let summary = apply_resolution(&mut state, &provider, &NoModifiers, &suite());
        assert_eq!(summary.healed, 0);
        assert_eq!(state.roster.get(PlayerId(0)).unwrap().health, 4);
    }

    #[test]
    fn healing_is_capped_at_max_health() {
        let mut state = state_of(2);
        state.roster.get_mut(PlayerId(0)).unwrap().health = MAX_HEALTH - 1;
        set_faces(&mut state, &[Face::Heart, Face::Heart, Face::Heart, Face::One, Face::Two, Face::Three]);
        let provider = ScriptedProvider::new();
        let summary = apply_resolution(&mut state, &provider, &NoModifiers, &suite());
        assert_eq!(summary.healed, 1);
        assert_eq!(state.roster.get(PlayerId(0)).unwrap().health, MAX_HEALTH);
    }

    #[test]
    fn outsider_attack_hits_occupants_and_prompts_yield() {
        let mut state = state_of(3);
        state.zone.enter(ZoneSlot::Primary, PlayerId(1));
        set_faces(&mut state, &[Face::Attack, Face::Attack, Face::One, Face::Two, Face::Three, Face::Heart]);
        let provider = ScriptedProvider::new();
        let summary = apply_resolution(&mut state, &provider, &NoModifiers, &suite());
        assert_eq!(summary.damage_dealt, 2);
        assert_eq!(summary.targets, vec![PlayerId(1)]);
        assert_eq!(state.roster.get(PlayerId(1)).unwrap().health, MAX_HEALTH - 2);
        assert_eq!(summary.prompts_created, 1);
    }

    #[test]
    fn occupant_attack_hits_everyone_outside() {
        let mut state = state_of(3);
        state.zone.enter(ZoneSlot::Primary, PlayerId(0));
        set_faces(&mut state, &[Face::Attack, Face::One, Face::Two, Face::Three, Face::Heart, Face::Energy]);
        let provider = ScriptedProvider::new();
        let summary = apply_resolution(&mut state, &provider, &NoModifiers, &suite());
        assert_eq!(summary.targets, vec![PlayerId(1), PlayerId(2)]);
        assert_eq!(summary.prompts_created, 0);
        assert_eq!(state.roster.get(PlayerId(1)).unwrap().health, MAX_HEALTH - 1);
        assert_eq!(state.roster.get(PlayerId(2)).unwrap().health, MAX_HEALTH - 1);
    }

    #[test]
    fn resolution_latch_blocks_double_application() {
        let mut state = state_of(2);
        set_faces(&mut state, &[Face::Energy, Face::Energy, Face::One, Face::Two, Face::Three, Face::Heart]);
        let provider = ScriptedProvider::new();
        let first = apply_resolution(&mut state, &provider, &NoModifiers, &suite());
        assert!(first.applied);
        let second = apply_resolution(&mut state, &provider, &NoModifiers, &suite());
        assert!(!second.applied);
        assert_eq!(state.roster.get(PlayerId(0)).unwrap().energy, 2);
    }

    #[test]
    fn empty_faces_resolve_to_nothing() {
        let mut state = state_of(2);
        let provider = ScriptedProvider::new();
        let summary = apply_resolution(&mut state, &provider, &NoModifiers, &suite());
        assert!(summary.applied);
        assert_eq!(summary.victory_points, 0);
        assert_eq!(summary.entered_zone, None);
        assert!(state.zone.is_empty());
    }

    #[test]
    fn failing_modifier_is_dropped_not_fatal() {
        struct Broken;
        impl PassiveModifier for Broken {
            fn energy_bonus(&self, _: &GameState, _: PlayerId) -> Result<i32, ModifierError> {
                Err(ModifierError {
                    source_id: "short-circuit".into(),
                    message: "no charge".into(),
                })
            }
        }
        let mut state = state_of(2);
        set_faces(&mut state, &[Face::Energy, Face::One, Face::Two, Face::Three, Face::Heart, Face::Heart]);
        let provider = ScriptedProvider::new();
        let summary = apply_resolution(&mut state, &provider, &Broken, &suite());
        assert_eq!(summary.energy_gained, 1);
    }

    #[test]
    fn lethal_damage_vacates_and_announces() {
        let mut state = state_of(3);
        state.zone.enter(ZoneSlot::Primary, PlayerId(1));
        state.roster.get_mut(PlayerId(1)).unwrap().health = 1;
        set_faces(&mut state, &[Face::Attack, Face::One, Face::Two, Face::Three, Face::Heart, Face::Energy]);
        let mut provider = ScriptedProvider::new();
        provider.set_yield(PlayerId(1), crate::strategy::YieldChoice::Stay);
        let summary = apply_resolution(&mut state, &provider, &NoModifiers, &suite());
        assert_eq!(summary.eliminated, vec![PlayerId(1)]);
        assert!(!state.zone.contains(PlayerId(1)));
    }
}
