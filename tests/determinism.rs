use kaiju_arena::{
    DeterminismMode, EventKind, GameConfig, GameState, GreedyProvider, NoModifiers, PlayerId,
    RngSuite, ScriptedProvider, SeatConfig, TurnOrchestrator, ZoneSlot, begin_yield_flow,
};

fn cpu_config(seed: u64) -> GameConfig {
    GameConfig::new(vec![
        SeatConfig::cpu("Gigazaur"),
        SeatConfig::cpu("Mekka"),
        SeatConfig::cpu("Drakonis"),
        SeatConfig::cpu("Pandarax"),
    ])
    .seeded(seed)
}

fn run_match(seed: u64) -> TurnOrchestrator<GreedyProvider, NoModifiers> {
    let mut game = TurnOrchestrator::with_defaults(cpu_config(seed)).expect("valid config");
    game.start_game();
    game.run_until_idle();
    game
}

#[test]
fn identical_seeds_give_identical_matches() {
    let first = run_match(0x00C0_FFEE);
    let second = run_match(0x00C0_FFEE);
    assert_eq!(first.state().events(), second.state().events());
    assert_eq!(first.state().winner, second.state().winner);
    assert_eq!(first.phase_history(), second.phase_history());
    assert_eq!(first.now_ms(), second.now_ms());
}

#[test]
fn different_seeds_diverge() {
    let first = run_match(1);
    let second = run_match(2);
    assert_ne!(first.state().events(), second.state().events());
}

#[test]
fn replay_against_baseline_reports_no_drift() {
    let first = run_match(0xBA5E);
    let baseline = first.drift_detector().recorded().clone();

    let mut replay = TurnOrchestrator::with_defaults(cpu_config(0xBA5E)).expect("valid config");
    replay.drift_detector_mut().set_baseline(baseline);
    replay.start_game();
    replay.run_until_idle();

    assert!(
        !replay
            .state()
            .events()
            .iter()
            .any(|e| e.kind == EventKind::DriftDetected)
    );
}

#[test]
fn tampered_baseline_is_flagged() {
    let first = run_match(0xBA5E);
    let mut baseline = first.drift_detector().recorded().clone();
    let Some(snapshot) = baseline.values_mut().next() else {
        panic!("baseline has snapshots");
    };
    snapshot.players[0].health -= 1;

    let mut replay = TurnOrchestrator::with_defaults(cpu_config(0xBA5E)).expect("valid config");
    replay.drift_detector_mut().set_baseline(baseline);
    replay.start_game();
    replay.run_until_idle();

    let drift = replay
        .state()
        .events()
        .iter()
        .find(|e| e.kind == EventKind::DriftDetected)
        .expect("drift flagged");
    assert!(drift.payload["fields"][0].as_str().unwrap().contains("health"));
}

#[test]
fn free_mode_advisories_carry_no_seed() {
    let mut state = GameState::new(GameConfig::new(vec![
        SeatConfig::cpu("Attacker"),
        SeatConfig::human("Defender"),
    ]));
    state.zone.enter(ZoneSlot::Primary, PlayerId(1));
    let provider = ScriptedProvider::new();
    let suite = RngSuite::new(DeterminismMode::Free);
    begin_yield_flow(&mut state, &provider, &suite, PlayerId(0), 2);
    let batch = state.yield_batch.as_ref().expect("batch");
    assert!(batch.prompt_for(PlayerId(1)).expect("prompt").advisory.seed.is_none());
}

#[test]
fn seeded_advisories_replay_the_same_seed() {
    let run = |_: ()| {
        let mut state = GameState::new(
            GameConfig::new(vec![SeatConfig::cpu("Attacker"), SeatConfig::human("Defender")])
                .seeded(77),
        );
        state.zone.enter(ZoneSlot::Primary, PlayerId(1));
        let provider = ScriptedProvider::new();
        let suite = RngSuite::new(DeterminismMode::Seeded(77));
        begin_yield_flow(&mut state, &provider, &suite, PlayerId(0), 2);
        state
            .yield_batch
            .as_ref()
            .and_then(|b| b.prompt_for(PlayerId(1)))
            .and_then(|p| p.advisory.seed)
            .expect("seed tagged")
    };
    assert_eq!(run(()), run(()));
}
