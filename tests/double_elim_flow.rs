use bracket_desk::bracket::{BracketState, MatchRef, SlotOrigin};
use bracket_desk::commands;
use bracket_desk::model::{Match, Participant, Slot, Stage};
use bracket_desk::store::{BracketStore, JsonFileStore};
use bracket_desk::types::CreateBracketRequest;

fn p(id: &str) -> Participant {
    Participant::new(id)
}

fn pair(a: &str, b: &str) -> Match {
    Match::pair(Some(p(a)), Some(p(b)))
}

/// Slot A wins every playable match in `stage`.
fn play(state: &mut BracketState, stage: Stage) {
    let count = if stage.is_final() { 1 } else { state.round(stage).unwrap().matches.len() };
    for index in 0..count {
        let at = MatchRef::new(stage, index);
        let game = state.match_at(at).unwrap().clone();
        if let Some(a) = game.slot_a {
            state.record_winner(at, &a).unwrap();
        }
    }
}

#[test]
fn sixteen_entrants_to_champion() {
    let entrants: Vec<Participant> = (1..=16).map(|i| p(&format!("e{i}"))).collect();
    let mut state = BracketState::new("spring-cup", entrants).unwrap();

    play(&mut state, Stage::WinnersR1);
    state.build_stage(Stage::WinnersQf).unwrap();
    state.build_stage(Stage::LosersR1).unwrap();
    play(&mut state, Stage::WinnersQf);
    play(&mut state, Stage::LosersR1);

    state.build_stage(Stage::WinnersSf).unwrap();
    state.build_stage(Stage::LosersR2).unwrap();
    assert_eq!(state.round(Stage::LosersR2).unwrap().matches[0], pair("e3", "e2"));
    play(&mut state, Stage::WinnersSf);
    play(&mut state, Stage::LosersR2);

    state.build_stage(Stage::LosersR3a).unwrap();
    assert_eq!(
        state.round(Stage::LosersR3a).unwrap().matches,
        vec![pair("e3", "e7"), pair("e11", "e15")]
    );
    play(&mut state, Stage::LosersR3a);

    state.build_stage(Stage::LosersR3b).unwrap();
    assert_eq!(
        state.round(Stage::LosersR3b).unwrap().matches,
        vec![pair("e3", "e5"), pair("e11", "e13")]
    );
    play(&mut state, Stage::LosersR3b);

    state.build_stage(Stage::LosersR4).unwrap();
    play(&mut state, Stage::LosersR4);

    state.build_stage(Stage::WinnersFinal).unwrap();
    assert_eq!(state.winners_final.game, pair("e1", "e9"));
    play(&mut state, Stage::WinnersFinal);

    state.build_stage(Stage::LosersFinal).unwrap();
    assert_eq!(state.losers_final.game, pair("e3", "e9"));
    play(&mut state, Stage::LosersFinal);

    state.build_stage(Stage::GrandFinal).unwrap();
    assert_eq!(state.grand_final.game, pair("e1", "e3"));
    assert_eq!(state.grand_final.origin(Slot::B), SlotOrigin::Derived);
    play(&mut state, Stage::GrandFinal);

    assert_eq!(state.champion(), Some(&p("e1")));
    assert!(state.stale_matches().is_empty());
}

#[test]
fn eight_unseeded_entrants_reach_a_champion() {
    let entrants: Vec<Participant> = (1..=8).map(|i| p(&format!("e{i}"))).collect();
    let mut state = BracketState::new("short-cup", entrants).unwrap();
    let r1 = &state.round(Stage::WinnersR1).unwrap().matches;
    assert!(r1.iter().all(|m| m.slot_a.is_some() && m.slot_b.is_none()));

    // Every opening match is a bye, so nobody drops into L-R1.
    play(&mut state, Stage::WinnersR1);
    assert!(state.build_stage(Stage::LosersR1).is_err());
    state.build_stage(Stage::WinnersQf).unwrap();
    assert_eq!(
        state.round(Stage::WinnersQf).unwrap().matches,
        vec![pair("e1", "e8"), pair("e4", "e5"), pair("e2", "e7"), pair("e3", "e6")]
    );
    play(&mut state, Stage::WinnersQf);

    state.build_stage(Stage::WinnersSf).unwrap();
    state.build_stage(Stage::LosersR2).unwrap();
    assert_eq!(
        state.round(Stage::LosersR2).unwrap().matches[0],
        Match::pair(Some(p("e8")), None)
    );
    play(&mut state, Stage::WinnersSf);
    play(&mut state, Stage::LosersR2);

    state.build_stage(Stage::LosersR3a).unwrap();
    play(&mut state, Stage::LosersR3a);
    state.build_stage(Stage::LosersR3b).unwrap();
    assert_eq!(
        state.round(Stage::LosersR3b).unwrap().matches,
        vec![pair("e8", "e4"), pair("e7", "e3")]
    );
    play(&mut state, Stage::LosersR3b);
    state.build_stage(Stage::LosersR4).unwrap();
    play(&mut state, Stage::LosersR4);

    state.build_stage(Stage::WinnersFinal).unwrap();
    assert_eq!(state.winners_final.game, pair("e1", "e2"));
    play(&mut state, Stage::WinnersFinal);
    state.build_stage(Stage::LosersFinal).unwrap();
    assert_eq!(state.losers_final.game, pair("e8", "e2"));
    play(&mut state, Stage::LosersFinal);
    state.build_stage(Stage::GrandFinal).unwrap();
    play(&mut state, Stage::GrandFinal);

    assert_eq!(state.champion(), Some(&p("e1")));
    assert!(state.stale_matches().is_empty());
}

#[test]
fn admin_flow_through_json_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path()).unwrap();
    let entrants: Vec<Participant> = (1..=16).map(|i| p(&format!("t{i}"))).collect();
    commands::create_bracket(&store, "teams", CreateBracketRequest { entrants, seeded: false }).unwrap();

    for index in 0..4 {
        let at = MatchRef::new(Stage::WinnersR1, index);
        let winner = store.load("teams").unwrap().unwrap().match_at(at).unwrap().slot_b.clone().unwrap();
        commands::record_winner(&store, "teams", at, &winner).unwrap();
    }
    let applied = commands::build_stage(&store, "teams", Stage::LosersR1).unwrap();
    assert_eq!(applied.result.stage, Stage::LosersR1);
    let saved = store.load("teams").unwrap().unwrap();
    let l1 = &saved.round(Stage::LosersR1).unwrap().matches;
    assert_eq!(l1[0], pair("t1", "t3"));
    assert_eq!(l1[1], pair("t5", "t7"));

    // Manual grand-final seat survives automatic syncing.
    commands::assign_slot(&store, "teams", MatchRef::new(Stage::GrandFinal, 0), Slot::A, Some(p("t2"))).unwrap();
    commands::sync_finals(&store, "teams").unwrap();
    let saved = store.load("teams").unwrap().unwrap();
    assert_eq!(saved.grand_final.game.slot_a, Some(p("t2")));
    assert_eq!(saved.grand_final.origin(Slot::A), SlotOrigin::Manual);
}
