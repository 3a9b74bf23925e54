//! Pure round-to-round progression for double-elimination brackets.
//!
//! Nothing in here touches storage or clocks. Every function takes finished
//! (or partly finished) rounds and returns the pairings they imply; callers
//! decide where the result goes.

use std::collections::HashSet;

use crate::error::BracketError;
use crate::model::{Match, Participant, Round, Stage};

/// Pair the winner of match `2i` with the winner of match `2i + 1`, in
/// original order. Matches without a recorded winner leave their slot empty.
/// An odd trailing match has no partner and yields no pairing.
pub fn derive_next_winners_round(previous: &Round, stage: Stage) -> Result<Round, BracketError> {
  let found = previous.resolved_winners().len();
  if found < 2 {
    return Err(BracketError::InsufficientInput { stage, found });
  }

  let winners = previous.winners();
  let matches = winners
    .chunks_exact(2)
    .map(|pair| Match::pair(pair[0].clone(), pair[1].clone()))
    .collect();
  Ok(Round::new(stage, matches))
}

/// Losers of every decided match with both slots filled. Byes drop nobody.
pub fn derive_losers_from_winners(round: &Round) -> Vec<Participant> {
  round
    .matches
    .iter()
    .filter_map(|m| m.loser().cloned())
    .collect()
}

/// Index-aligned merge of two participant streams into one losers round.
/// The shorter stream leaves its slot empty instead of dropping the match.
pub fn derive_merged_losers_round(
  stream_a: &[Participant],
  stream_b: &[Participant],
  stage: Stage,
) -> Result<Round, BracketError> {
  if stream_a.is_empty() && stream_b.is_empty() {
    return Err(BracketError::InsufficientInput { stage, found: 0 });
  }
  let seen: HashSet<&Participant> = stream_a.iter().collect();
  if let Some(dup) = stream_b.iter().find(|p| seen.contains(p)) {
    return Err(BracketError::mismatch(
      stage,
      format!("{dup} appears in both merged streams"),
    ));
  }

  let len = stream_a.len().max(stream_b.len());
  let matches = (0..len)
    .map(|i| Match::pair(stream_a.get(i).cloned(), stream_b.get(i).cloned()))
    .collect();
  Ok(Round::new(stage, matches))
}

/// Pair a flat list of ids two at a time. An odd tail becomes a bye with slot B empty.
pub fn build_pairs_from_ids(ids: &[Participant], stage: Stage) -> Result<Round, BracketError> {
  if ids.len() < 2 {
    return Err(BracketError::InsufficientInput { stage, found: ids.len() });
  }
  let matches = ids
    .chunks(2)
    .map(|pair| Match::pair(Some(pair[0].clone()), pair.get(1).cloned()))
    .collect();
  Ok(Round::new(stage, matches))
}

/// Record `participant` as the winner. The input match is never modified.
pub fn set_winner(game: &Match, participant: &Participant) -> Result<Match, BracketError> {
  if !game.contains(participant) {
    return Err(BracketError::InvalidWinner {
      participant: participant.clone(),
    });
  }
  let mut decided = game.clone();
  decided.winner = Some(participant.clone());
  Ok(decided)
}
