use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

use crate::error::BracketError;
use crate::model::{Match, Participant, Round, Slot, Stage};
use crate::progression::{
  build_pairs_from_ids, derive_losers_from_winners, derive_merged_losers_round,
  derive_next_winners_round, set_winner,
};

pub const MAX_ENTRANTS: usize = 16;

/// Where a final slot's current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SlotOrigin {
  #[default]
  Unset,
  Derived,
  Manual,
  Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalMatch {
  pub stage: Stage,
  #[serde(flatten)]
  pub game: Match,
  pub origins: [SlotOrigin; 2],
}

impl FinalMatch {
  fn new(stage: Stage) -> Self {
    FinalMatch {
      stage,
      game: Match::empty(),
      origins: [SlotOrigin::Unset; 2],
    }
  }

  pub fn origin(&self, slot: Slot) -> SlotOrigin {
    self.origins[slot_index(slot)]
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRef {
  pub stage: Stage,
  pub index: usize,
}

impl MatchRef {
  pub fn new(stage: Stage, index: usize) -> Self {
    MatchRef { stage, index }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum FinalMerge {
  Filled,
  Unchanged,
  Preserved,
  Conflict {
    kept: Option<Participant>,
    derived: Option<Participant>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSyncReport {
  pub stage: Stage,
  pub slot: Slot,
  pub outcome: FinalMerge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
  pub stage: Stage,
  pub matches: usize,
  pub finals: Vec<FinalSyncReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleMatch {
  pub at: MatchRef,
  pub current: Match,
  pub derived: Match,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchUpdate {
  pub at: MatchRef,
  pub game: Match,
  pub stale_dependents: Vec<MatchRef>,
}

/// Three-way merge for one final slot: derived value, prior admin value, explicit clear.
pub fn merge_final_slot(
  current: Option<&Participant>,
  origin: SlotOrigin,
  derived: Option<&Participant>,
) -> (Option<Participant>, SlotOrigin, FinalMerge) {
  let keep = |outcome| (current.cloned(), origin, outcome);
  match origin {
    SlotOrigin::Manual | SlotOrigin::Cleared => keep(FinalMerge::Preserved),
    SlotOrigin::Derived if current.is_some() => {
      if current == derived {
        keep(FinalMerge::Unchanged)
      } else {
        keep(FinalMerge::Conflict {
          kept: current.cloned(),
          derived: derived.cloned(),
        })
      }
    }
    _ => match derived {
      Some(value) => (Some(value.clone()), SlotOrigin::Derived, FinalMerge::Filled),
      None => keep(FinalMerge::Unchanged),
    },
  }
}

/// Stages whose results feed `stage`.
pub fn upstream(stage: Stage) -> &'static [Stage] {
  match stage {
    Stage::WinnersR1 => &[],
    Stage::WinnersQf => &[Stage::WinnersR1],
    Stage::WinnersSf => &[Stage::WinnersQf],
    Stage::WinnersFinal => &[Stage::WinnersSf],
    Stage::LosersR1 => &[Stage::WinnersR1],
    Stage::LosersR2 => &[Stage::WinnersQf, Stage::LosersR1],
    Stage::LosersR3a => &[Stage::LosersR2],
    Stage::LosersR3b => &[Stage::LosersR3a, Stage::WinnersSf],
    Stage::LosersR4 => &[Stage::LosersR3b],
    Stage::LosersFinal => &[Stage::LosersR4, Stage::WinnersFinal],
    Stage::GrandFinal => &[Stage::WinnersFinal, Stage::LosersFinal],
  }
}

/// Every stage transitively fed by `root`, not including `root`.
pub fn downstream(root: Stage) -> Vec<Stage> {
  let mut affected = HashSet::new();
  let mut queue = VecDeque::from([root]);
  while let Some(current) = queue.pop_front() {
    for stage in Stage::ALL {
      if upstream(stage).contains(&current) && affected.insert(stage) {
        queue.push_back(stage);
      }
    }
  }
  let mut out: Vec<Stage> = affected.into_iter().collect();
  out.sort();
  out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketState {
  pub tournament_id: String,
  pub entrants: Vec<Participant>,
  pub seeded: bool,
  pub rounds: Vec<Round>,
  pub winners_final: FinalMatch,
  pub losers_final: FinalMatch,
  pub grand_final: FinalMatch,
  #[serde(default)]
  pub saved_at: Option<DateTime<Utc>>,
}

impl BracketState {
  /// A full field goes into W-R1 in the order given. A short field is placed
  /// like seeds 1..n so byes spread over every match.
  pub fn new(tournament_id: impl Into<String>, entrants: Vec<Participant>) -> Result<Self, BracketError> {
    Self::create(tournament_id.into(), entrants, false)
  }

  /// Entrants are taken as seeds 1..n and placed so the top seeds meet last.
  pub fn seeded(tournament_id: impl Into<String>, entrants: Vec<Participant>) -> Result<Self, BracketError> {
    Self::create(tournament_id.into(), entrants, true)
  }

  fn create(tournament_id: String, entrants: Vec<Participant>, seeded: bool) -> Result<Self, BracketError> {
    validate_entrants(&entrants)?;
    let rounds = Stage::ROUNDS.iter().map(|stage| Round::unbuilt(*stage)).collect();
    let mut state = BracketState {
      tournament_id,
      entrants,
      seeded,
      rounds,
      winners_final: FinalMatch::new(Stage::WinnersFinal),
      losers_final: FinalMatch::new(Stage::LosersFinal),
      grand_final: FinalMatch::new(Stage::GrandFinal),
      saved_at: None,
    };
    state.build_stage(Stage::WinnersR1)?;
    info!(
      "bracket {} created with {} entrants (seeded: {})",
      state.tournament_id,
      state.entrants.len(),
      seeded
    );
    Ok(state)
  }

  pub fn round(&self, stage: Stage) -> Option<&Round> {
    self.rounds.iter().find(|round| round.stage == stage)
  }

  fn round_mut(&mut self, stage: Stage) -> Option<&mut Round> {
    self.rounds.iter_mut().find(|round| round.stage == stage)
  }

  pub fn final_match(&self, stage: Stage) -> Result<&FinalMatch, BracketError> {
    match stage {
      Stage::WinnersFinal => Ok(&self.winners_final),
      Stage::LosersFinal => Ok(&self.losers_final),
      Stage::GrandFinal => Ok(&self.grand_final),
      _ => Err(BracketError::NotAFinal { stage }),
    }
  }

  fn final_match_mut(&mut self, stage: Stage) -> Result<&mut FinalMatch, BracketError> {
    match stage {
      Stage::WinnersFinal => Ok(&mut self.winners_final),
      Stage::LosersFinal => Ok(&mut self.losers_final),
      Stage::GrandFinal => Ok(&mut self.grand_final),
      _ => Err(BracketError::NotAFinal { stage }),
    }
  }

  pub fn match_at(&self, at: MatchRef) -> Result<&Match, BracketError> {
    let missing = || BracketError::MatchNotFound { stage: at.stage, index: at.index };
    if at.stage.is_final() {
      if at.index != 0 {
        return Err(missing());
      }
      return Ok(&self.final_match(at.stage)?.game);
    }
    self
      .round(at.stage)
      .and_then(|round| round.matches.get(at.index))
      .ok_or_else(missing)
  }

  fn replace_match(&mut self, at: MatchRef, game: Match) -> Result<(), BracketError> {
    let missing = BracketError::MatchNotFound { stage: at.stage, index: at.index };
    if at.stage.is_final() {
      if at.index != 0 {
        return Err(missing);
      }
      self.final_match_mut(at.stage)?.game = game;
      return Ok(());
    }
    let slot = self
      .round_mut(at.stage)
      .and_then(|round| round.matches.get_mut(at.index))
      .ok_or(missing)?;
    *slot = game;
    Ok(())
  }

  pub fn champion(&self) -> Option<&Participant> {
    self.grand_final.game.winner.as_ref()
  }

  fn round_or_unbuilt(&self, stage: Stage) -> Round {
    self.round(stage).cloned().unwrap_or_else(|| Round::unbuilt(stage))
  }

  fn opening_round(&self) -> Result<Round, BracketError> {
    let stage = Stage::WinnersR1;
    if !self.seeded && self.entrants.len() == MAX_ENTRANTS {
      return build_pairs_from_ids(&self.entrants, stage);
    }
    let slots: Vec<Option<Participant>> = seed_positions(MAX_ENTRANTS as u32)
      .into_iter()
      .map(|seed| self.entrants.get(seed as usize - 1).cloned())
      .collect();
    let matches = slots
      .chunks(2)
      .map(|pair| Match::pair(pair[0].clone(), pair[1].clone()))
      .collect();
    Ok(Round::new(stage, matches))
  }

  /// What a round stage would contain if rebuilt from current upstream results.
  pub fn derive_round(&self, stage: Stage) -> Result<Round, BracketError> {
    let round = match stage {
      Stage::WinnersR1 => self.opening_round()?,
      Stage::WinnersQf => derive_next_winners_round(&self.round_or_unbuilt(Stage::WinnersR1), stage)?,
      Stage::WinnersSf => derive_next_winners_round(&self.round_or_unbuilt(Stage::WinnersQf), stage)?,
      Stage::LosersR1 => {
        let dropped = derive_losers_from_winners(&self.round_or_unbuilt(Stage::WinnersR1));
        match dropped.as_slice() {
          // A nine-entrant field drops a single player; keep them as a bye.
          [only] => Round::new(stage, vec![Match::pair(Some(only.clone()), None)]),
          _ => build_pairs_from_ids(&dropped, stage)?,
        }
      }
      Stage::LosersR2 => {
        let dropped = derive_losers_from_winners(&self.round_or_unbuilt(Stage::WinnersQf));
        let surviving = self.round_or_unbuilt(Stage::LosersR1).resolved_winners();
        derive_merged_losers_round(&dropped, &surviving, stage)?
      }
      Stage::LosersR3a => derive_next_winners_round(&self.round_or_unbuilt(Stage::LosersR2), stage)?,
      Stage::LosersR3b => {
        let surviving = self.round_or_unbuilt(Stage::LosersR3a).resolved_winners();
        let dropped = derive_losers_from_winners(&self.round_or_unbuilt(Stage::WinnersSf));
        derive_merged_losers_round(&surviving, &dropped, stage)?
      }
      Stage::LosersR4 => derive_next_winners_round(&self.round_or_unbuilt(Stage::LosersR3b), stage)?,
      Stage::WinnersFinal | Stage::LosersFinal | Stage::GrandFinal => {
        return Err(BracketError::mismatch(stage, "finals are merged, not rebuilt"));
      }
    };
    pad_to_capacity(round)
  }

  /// Participants each final slot would receive from current upstream results.
  pub fn derive_final(&self, stage: Stage) -> Result<Match, BracketError> {
    let first_winner = |stage: Stage, index: usize| {
      self
        .round(stage)
        .and_then(|round| round.matches.get(index))
        .and_then(|m| m.winner.clone())
    };
    let pairing = match stage {
      Stage::WinnersFinal => Match::pair(
        first_winner(Stage::WinnersSf, 0),
        first_winner(Stage::WinnersSf, 1),
      ),
      Stage::LosersFinal => Match::pair(
        first_winner(Stage::LosersR4, 0),
        self.winners_final.game.loser().cloned(),
      ),
      Stage::GrandFinal => Match::pair(
        self.winners_final.game.winner.clone(),
        self.losers_final.game.winner.clone(),
      ),
      _ => return Err(BracketError::NotAFinal { stage }),
    };
    Ok(pairing)
  }

  /// Rebuild one stage from its upstream results. Matches whose pairing did not
  /// change keep their recorded winner.
  pub fn build_stage(&mut self, stage: Stage) -> Result<BuildReport, BracketError> {
    if stage.is_final() {
      let derived = self.derive_final(stage)?;
      let found = [&derived.slot_a, &derived.slot_b].iter().filter(|p| p.is_some()).count();
      if found < 2 {
        return Err(BracketError::InsufficientInput { stage, found });
      }
      let finals = self.sync_final(stage)?;
      return Ok(BuildReport { stage, matches: 1, finals });
    }

    let derived = self.derive_round(stage)?;
    let round = self
      .round_mut(stage)
      .ok_or_else(|| BracketError::mismatch(stage, "round missing from bracket"))?;
    let mut changed = 0;
    for (existing, fresh) in round.matches.iter_mut().zip(derived.matches) {
      if !existing.same_pairing(&fresh) {
        *existing = fresh;
        changed += 1;
      }
    }
    debug!("built {stage}: {changed} matches changed");
    Ok(BuildReport {
      stage,
      matches: round.matches.len(),
      finals: Vec::new(),
    })
  }

  fn sync_final(&mut self, stage: Stage) -> Result<Vec<FinalSyncReport>, BracketError> {
    let derived = self.derive_final(stage)?;
    let target = self.final_match_mut(stage)?;
    let mut reports = Vec::with_capacity(2);
    for slot in [Slot::A, Slot::B] {
      let (value, origin, outcome) =
        merge_final_slot(target.game.slot(slot), target.origin(slot), derived.slot(slot));
      if let FinalMerge::Conflict { kept, derived } = &outcome {
        warn!(
          "{stage} slot {slot:?} keeps {} but results now give {}",
          display_slot(kept.as_ref()),
          display_slot(derived.as_ref())
        );
      }
      if outcome == FinalMerge::Filled {
        target.game = target.game.with_slot(slot, value);
      }
      target.origins[slot_index(slot)] = origin;
      reports.push(FinalSyncReport { stage, slot, outcome });
    }
    Ok(reports)
  }

  /// Fill the three finals from current results; admin-set and derived slots are kept.
  pub fn sync_finals(&mut self) -> Vec<FinalSyncReport> {
    let mut reports = Vec::new();
    // Order matters: the losers final reads the winners final's loser.
    for stage in [Stage::WinnersFinal, Stage::LosersFinal, Stage::GrandFinal] {
      if let Ok(mut found) = self.sync_final(stage) {
        reports.append(&mut found);
      }
    }
    reports
  }

  /// Record a result. Already-built downstream pairings are reported, not rebuilt.
  pub fn record_winner(&mut self, at: MatchRef, participant: &Participant) -> Result<MatchUpdate, BracketError> {
    let game = set_winner(self.match_at(at)?, participant)?;
    self.replace_match(at, game.clone())?;
    let stale_dependents = self.stale_dependents_of(at);
    info!("{} {}#{}: winner {participant}", self.tournament_id, at.stage, at.index);
    Ok(MatchUpdate { at, game, stale_dependents })
  }

  /// Admin override of one slot. `None` clears it.
  pub fn assign_slot(
    &mut self,
    at: MatchRef,
    slot: Slot,
    participant: Option<Participant>,
  ) -> Result<MatchUpdate, BracketError> {
    if let Some(p) = &participant {
      if !self.entrants.contains(p) {
        return Err(BracketError::InvalidEntrants(format!("{p} is not registered")));
      }
    }
    let origin = if participant.is_some() { SlotOrigin::Manual } else { SlotOrigin::Cleared };
    let game = self.match_at(at)?.with_slot(slot, participant);
    self.replace_match(at, game.clone())?;
    if at.stage.is_final() {
      self.final_match_mut(at.stage)?.origins[slot_index(slot)] = origin;
    }
    let stale_dependents = self.stale_dependents_of(at);
    Ok(MatchUpdate { at, game, stale_dependents })
  }

  /// Hand a final slot back to automatic filling. The slot is emptied.
  pub fn release_final_slot(&mut self, stage: Stage, slot: Slot) -> Result<&FinalMatch, BracketError> {
    let target = self.final_match_mut(stage)?;
    target.game = target.game.clear_slot(slot);
    target.origins[slot_index(slot)] = SlotOrigin::Unset;
    Ok(target)
  }

  /// Built downstream matches holding a participant that re-derivation would not put there.
  pub fn stale_matches(&self) -> Vec<StaleMatch> {
    let mut stale = Vec::new();
    for stage in Stage::ALL {
      if stage == Stage::WinnersR1 {
        continue;
      }
      if stage.is_final() {
        let Ok(current) = self.final_match(stage) else {
          continue;
        };
        let derived = self.derive_final(stage).unwrap_or_default();
        let diverged = [Slot::A, Slot::B].iter().any(|slot| {
          current.origin(*slot) == SlotOrigin::Derived
            && current.game.slot(*slot).is_some()
            && current.game.slot(*slot) != derived.slot(*slot)
        });
        if diverged {
          stale.push(StaleMatch {
            at: MatchRef::new(stage, 0),
            current: current.game.clone(),
            derived,
          });
        }
        continue;
      }

      let Some(current) = self.round(stage) else {
        continue;
      };
      if !current.is_built() {
        continue;
      }
      let derived = self
        .derive_round(stage)
        .unwrap_or_else(|_| Round::unbuilt(stage));
      for (index, game) in current.matches.iter().enumerate() {
        let fresh = derived.matches.get(index).cloned().unwrap_or_default();
        if slot_diverged(game, &fresh) {
          stale.push(StaleMatch {
            at: MatchRef::new(stage, index),
            current: game.clone(),
            derived: fresh,
          });
        }
      }
    }
    stale
  }

  fn stale_dependents_of(&self, at: MatchRef) -> Vec<MatchRef> {
    let below = downstream(at.stage);
    let stale: Vec<MatchRef> = self
      .stale_matches()
      .into_iter()
      .map(|s| s.at)
      .filter(|r| below.contains(&r.stage))
      .collect();
    if !stale.is_empty() {
      warn!(
        "{} {}#{} changed; {} downstream matches are now stale",
        self.tournament_id,
        at.stage,
        at.index,
        stale.len()
      );
    }
    stale
  }

  /// Clear every stage fed, directly or not, by `at`'s stage. Returns what was cleared.
  pub fn reset_dependents(&mut self, at: MatchRef) -> Result<Vec<Stage>, BracketError> {
    self.match_at(at)?;
    let affected = downstream(at.stage);
    for stage in &affected {
      if stage.is_final() {
        *self.final_match_mut(*stage)? = FinalMatch::new(*stage);
      } else if let Some(round) = self.round_mut(*stage) {
        *round = Round::unbuilt(*stage);
      }
    }
    info!("{} reset {} stages below {}", self.tournament_id, affected.len(), at.stage);
    Ok(affected)
  }
}

fn validate_entrants(entrants: &[Participant]) -> Result<(), BracketError> {
  if entrants.len() < 2 {
    return Err(BracketError::InvalidEntrants("need at least two entrants".to_string()));
  }
  if entrants.len() > MAX_ENTRANTS {
    return Err(BracketError::InvalidEntrants(format!(
      "{} entrants registered; the bracket holds {MAX_ENTRANTS}",
      entrants.len()
    )));
  }
  let mut seen = HashSet::new();
  for entrant in entrants {
    if entrant.as_str().trim().is_empty() {
      return Err(BracketError::InvalidEntrants("blank entrant id".to_string()));
    }
    if !seen.insert(entrant) {
      return Err(BracketError::InvalidEntrants(format!("{entrant} registered twice")));
    }
  }
  Ok(())
}

fn pad_to_capacity(mut round: Round) -> Result<Round, BracketError> {
  let capacity = round.stage.capacity();
  if round.matches.len() > capacity {
    return Err(BracketError::mismatch(
      round.stage,
      format!("{} pairings for {capacity} matches", round.matches.len()),
    ));
  }
  round.matches.resize(capacity, Match::empty());
  Ok(round)
}

fn slot_diverged(current: &Match, derived: &Match) -> bool {
  [Slot::A, Slot::B]
    .iter()
    .any(|slot| current.slot(*slot).is_some() && current.slot(*slot) != derived.slot(*slot))
}

fn slot_index(slot: Slot) -> usize {
  match slot {
    Slot::A => 0,
    Slot::B => 1,
  }
}

fn display_slot(slot: Option<&Participant>) -> String {
  slot.map(|p| p.to_string()).unwrap_or_else(|| "nobody".to_string())
}

fn seed_positions(size: u32) -> Vec<u32> {
  let mut seeds = vec![1u32];
  while seeds.len() < size as usize {
    let n = seeds.len() as u32;
    let mut next = Vec::with_capacity(seeds.len() * 2);
    for seed in seeds.iter().copied() {
      next.push(seed);
      next.push((n * 2 + 1).saturating_sub(seed));
    }
    seeds = next;
  }
  seeds
}
