use crate::bracket::{BracketState, BuildReport, FinalMatch, FinalSyncReport, MatchRef, MatchUpdate, StaleMatch};
use crate::error::DeskError;
use crate::model::{Participant, Slot, Stage};
use crate::store::{validate_tournament_id, BracketStore};
use crate::types::CreateBracketRequest;
use serde::Serialize;
use tracing::info;

// ── Helpers ─────────────────────────────────────────────────────────────

/// Load the bracket, run `f` on it, then save the whole document back.
/// Nothing is saved if `f` fails.
fn with_bracket<F, R>(store: &dyn BracketStore, tournament_id: &str, f: F) -> Result<(R, BracketState), DeskError>
where
    F: FnOnce(&mut BracketState) -> Result<R, DeskError>,
{
    let mut state = load_bracket(store, tournament_id)?;
    let out = f(&mut state)?;
    let saved = store.save(tournament_id, &state)?;
    Ok((out, saved))
}

/// Outcome of an admin operation alongside the bracket as saved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Applied<T> {
    pub result: T,
    pub bracket: BracketState,
}

fn applied<T>((result, bracket): (T, BracketState)) -> Applied<T> {
    Applied { result, bracket }
}

// ── Commands ────────────────────────────────────────────────────────────

pub fn list_tournaments(store: &dyn BracketStore) -> Result<Vec<String>, DeskError> {
    Ok(store.list()?)
}

pub fn load_bracket(store: &dyn BracketStore, tournament_id: &str) -> Result<BracketState, DeskError> {
    store
        .load(tournament_id)?
        .ok_or_else(|| DeskError::BracketNotFound(tournament_id.to_string()))
}

/// Create or replace the bracket for a tournament.
pub fn create_bracket(
    store: &dyn BracketStore,
    tournament_id: &str,
    request: CreateBracketRequest,
) -> Result<BracketState, DeskError> {
    let id = validate_tournament_id(tournament_id)?;
    let state = if request.seeded {
        BracketState::seeded(id, request.entrants)?
    } else {
        BracketState::new(id, request.entrants)?
    };
    let saved = store.save(id, &state)?;
    info!("bracket {id} saved with {} entrants", saved.entrants.len());
    Ok(saved)
}

pub fn build_stage(
    store: &dyn BracketStore,
    tournament_id: &str,
    stage: Stage,
) -> Result<Applied<BuildReport>, DeskError> {
    with_bracket(store, tournament_id, |state| Ok(state.build_stage(stage)?)).map(applied)
}

pub fn sync_finals(store: &dyn BracketStore, tournament_id: &str) -> Result<Applied<Vec<FinalSyncReport>>, DeskError> {
    with_bracket(store, tournament_id, |state| Ok(state.sync_finals())).map(applied)
}

pub fn record_winner(
    store: &dyn BracketStore,
    tournament_id: &str,
    at: MatchRef,
    participant: &Participant,
) -> Result<Applied<MatchUpdate>, DeskError> {
    with_bracket(store, tournament_id, |state| Ok(state.record_winner(at, participant)?)).map(applied)
}

pub fn assign_slot(
    store: &dyn BracketStore,
    tournament_id: &str,
    at: MatchRef,
    slot: Slot,
    participant: Option<Participant>,
) -> Result<Applied<MatchUpdate>, DeskError> {
    with_bracket(store, tournament_id, |state| Ok(state.assign_slot(at, slot, participant)?)).map(applied)
}

pub fn release_final_slot(
    store: &dyn BracketStore,
    tournament_id: &str,
    stage: Stage,
    slot: Slot,
) -> Result<Applied<FinalMatch>, DeskError> {
    with_bracket(store, tournament_id, |state| Ok(state.release_final_slot(stage, slot)?.clone())).map(applied)
}

pub fn reset_dependents(
    store: &dyn BracketStore,
    tournament_id: &str,
    at: MatchRef,
) -> Result<Applied<Vec<Stage>>, DeskError> {
    with_bracket(store, tournament_id, |state| Ok(state.reset_dependents(at)?)).map(applied)
}

/// Read-only; nothing is saved.
pub fn stale_matches(store: &dyn BracketStore, tournament_id: &str) -> Result<Vec<StaleMatch>, DeskError> {
    Ok(load_bracket(store, tournament_id)?.stale_matches())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BracketError, StoreError};
    use crate::store::MemoryStore;

    fn p(id: &str) -> Participant {
        Participant::new(id)
    }

    fn create(store: &MemoryStore) -> BracketState {
        let entrants = (1..=16).map(|i| p(&format!("e{i}"))).collect();
        create_bracket(store, "cup", CreateBracketRequest { entrants, seeded: false }).unwrap()
    }

    #[test]
    fn create_then_load() {
        let store = MemoryStore::new();
        let created = create(&store);
        assert_eq!(load_bracket(&store, "cup").unwrap(), created);
        assert_eq!(list_tournaments(&store).unwrap(), vec!["cup".to_string()]);
    }

    #[test]
    fn missing_bracket_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            load_bracket(&store, "nope"),
            Err(DeskError::BracketNotFound(_))
        ));
        assert!(matches!(
            create_bracket(&store, "Bad Id", CreateBracketRequest { entrants: vec![], seeded: false }),
            Err(DeskError::Store(StoreError::InvalidId(_)))
        ));
    }

    #[test]
    fn failed_operation_saves_nothing() {
        let store = MemoryStore::new();
        let created = create(&store);
        let err = record_winner(&store, "cup", MatchRef::new(Stage::WinnersR1, 0), &p("e5")).unwrap_err();
        assert!(matches!(err, DeskError::Bracket(BracketError::InvalidWinner { .. })));
        assert_eq!(load_bracket(&store, "cup").unwrap(), created);
    }

    #[test]
    fn winner_is_persisted() {
        let store = MemoryStore::new();
        create(&store);
        let applied = record_winner(&store, "cup", MatchRef::new(Stage::WinnersR1, 0), &p("e2")).unwrap();
        assert_eq!(applied.result.game.winner, Some(p("e2")));
        let loaded = load_bracket(&store, "cup").unwrap();
        assert_eq!(
            loaded.match_at(MatchRef::new(Stage::WinnersR1, 0)).unwrap().winner,
            Some(p("e2"))
        );
    }

    #[test]
    fn stale_report_reads_saved_state() {
        let store = MemoryStore::new();
        create(&store);
        for index in 0..8 {
            let at = MatchRef::new(Stage::WinnersR1, index);
            let a = load_bracket(&store, "cup").unwrap().match_at(at).unwrap().slot_a.clone().unwrap();
            record_winner(&store, "cup", at, &a).unwrap();
        }
        build_stage(&store, "cup", Stage::WinnersQf).unwrap();
        record_winner(&store, "cup", MatchRef::new(Stage::WinnersR1, 7), &p("e16")).unwrap();
        let stale = stale_matches(&store, "cup").unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].at, MatchRef::new(Stage::WinnersQf, 3));
    }
}
