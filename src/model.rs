use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque player or team identifier. The bracket never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Participant(String);

impl Participant {
  pub fn new(id: impl Into<String>) -> Self {
    Participant(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Participant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Participant {
  fn from(value: &str) -> Self {
    Participant::new(value)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
  Winners,
  Losers,
  Grand,
}

/// Every stage of the 16-entrant double-elimination layout, in build order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
  #[serde(rename = "W-R1")]
  WinnersR1,
  #[serde(rename = "W-QF")]
  WinnersQf,
  #[serde(rename = "W-SF")]
  WinnersSf,
  #[serde(rename = "W-Final")]
  WinnersFinal,
  #[serde(rename = "L-R1")]
  LosersR1,
  #[serde(rename = "L-R2")]
  LosersR2,
  #[serde(rename = "L-R3A")]
  LosersR3a,
  #[serde(rename = "L-R3B")]
  LosersR3b,
  #[serde(rename = "L-R4")]
  LosersR4,
  #[serde(rename = "L-Final")]
  LosersFinal,
  #[serde(rename = "GF")]
  GrandFinal,
}

impl Stage {
  pub const ALL: [Stage; 11] = [
    Stage::WinnersR1,
    Stage::WinnersQf,
    Stage::WinnersSf,
    Stage::WinnersFinal,
    Stage::LosersR1,
    Stage::LosersR2,
    Stage::LosersR3a,
    Stage::LosersR3b,
    Stage::LosersR4,
    Stage::LosersFinal,
    Stage::GrandFinal,
  ];

  /// Stages stored as rounds; the three finals are singletons.
  pub const ROUNDS: [Stage; 8] = [
    Stage::WinnersR1,
    Stage::WinnersQf,
    Stage::WinnersSf,
    Stage::LosersR1,
    Stage::LosersR2,
    Stage::LosersR3a,
    Stage::LosersR3b,
    Stage::LosersR4,
  ];

  pub fn side(self) -> Side {
    match self {
      Stage::WinnersR1 | Stage::WinnersQf | Stage::WinnersSf | Stage::WinnersFinal => Side::Winners,
      Stage::GrandFinal => Side::Grand,
      _ => Side::Losers,
    }
  }

  /// Short label shown on the admin board.
  pub fn label(self) -> &'static str {
    match self {
      Stage::WinnersR1 => "R1",
      Stage::WinnersQf => "QF",
      Stage::WinnersSf => "SF",
      Stage::WinnersFinal => "Final",
      Stage::LosersR1 => "R1",
      Stage::LosersR2 => "R2",
      Stage::LosersR3a => "R3A",
      Stage::LosersR3b => "R3B",
      Stage::LosersR4 => "R4",
      Stage::LosersFinal => "Final",
      Stage::GrandFinal => "Grand Final",
    }
  }

  pub fn capacity(self) -> usize {
    match self {
      Stage::WinnersR1 => 8,
      Stage::WinnersQf | Stage::LosersR1 | Stage::LosersR2 => 4,
      Stage::WinnersSf | Stage::LosersR3a | Stage::LosersR3b => 2,
      Stage::LosersR4 | Stage::WinnersFinal | Stage::LosersFinal | Stage::GrandFinal => 1,
    }
  }

  pub fn is_final(self) -> bool {
    matches!(self, Stage::WinnersFinal | Stage::LosersFinal | Stage::GrandFinal)
  }

  pub fn parse(raw: &str) -> Option<Stage> {
    let wanted = raw.trim();
    Stage::ALL
      .iter()
      .copied()
      .find(|stage| stage.key().eq_ignore_ascii_case(wanted))
  }

  /// Path/wire key, identical to the serde name.
  pub fn key(self) -> &'static str {
    match self {
      Stage::WinnersR1 => "W-R1",
      Stage::WinnersQf => "W-QF",
      Stage::WinnersSf => "W-SF",
      Stage::WinnersFinal => "W-Final",
      Stage::LosersR1 => "L-R1",
      Stage::LosersR2 => "L-R2",
      Stage::LosersR3a => "L-R3A",
      Stage::LosersR3b => "L-R3B",
      Stage::LosersR4 => "L-R4",
      Stage::LosersFinal => "L-Final",
      Stage::GrandFinal => "GF",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.key())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slot {
  A,
  B,
}

impl Slot {
  pub fn other(self) -> Slot {
    match self {
      Slot::A => Slot::B,
      Slot::B => Slot::A,
    }
  }

  pub fn parse(raw: &str) -> Option<Slot> {
    match raw.trim().to_ascii_lowercase().as_str() {
      "a" | "0" => Some(Slot::A),
      "b" | "1" => Some(Slot::B),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchState {
  Empty,
  PartiallyFilled,
  Filled,
  Decided,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
  pub slot_a: Option<Participant>,
  pub slot_b: Option<Participant>,
  pub winner: Option<Participant>,
}

impl Match {
  pub fn empty() -> Self {
    Match::default()
  }

  pub fn pair(slot_a: Option<Participant>, slot_b: Option<Participant>) -> Self {
    Match { slot_a, slot_b, winner: None }
  }

  pub fn slot(&self, slot: Slot) -> Option<&Participant> {
    match slot {
      Slot::A => self.slot_a.as_ref(),
      Slot::B => self.slot_b.as_ref(),
    }
  }

  pub fn contains(&self, participant: &Participant) -> bool {
    self.slot_a.as_ref() == Some(participant) || self.slot_b.as_ref() == Some(participant)
  }

  pub fn is_filled(&self) -> bool {
    self.slot_a.is_some() && self.slot_b.is_some()
  }

  pub fn state(&self) -> MatchState {
    if self.winner.is_some() {
      return MatchState::Decided;
    }
    match (self.slot_a.is_some(), self.slot_b.is_some()) {
      (true, true) => MatchState::Filled,
      (false, false) => MatchState::Empty,
      _ => MatchState::PartiallyFilled,
    }
  }

  /// The other slot's participant, once a winner is recorded. Byes have none.
  pub fn loser(&self) -> Option<&Participant> {
    let winner = self.winner.as_ref()?;
    if !self.is_filled() {
      return None;
    }
    if self.slot_a.as_ref() == Some(winner) {
      self.slot_b.as_ref()
    } else {
      self.slot_a.as_ref()
    }
  }

  /// Replace one slot. Clearing a slot always drops the recorded winner; a
  /// replacement keeps it only while it still sits in one of the slots.
  pub fn with_slot(&self, slot: Slot, participant: Option<Participant>) -> Match {
    let mut next = self.clone();
    let clearing = participant.is_none();
    match slot {
      Slot::A => next.slot_a = participant,
      Slot::B => next.slot_b = participant,
    }
    let keep = !clearing && next.winner.as_ref().is_some_and(|w| next.contains(w));
    if !keep {
      next.winner = None;
    }
    next
  }

  pub fn clear_slot(&self, slot: Slot) -> Match {
    self.with_slot(slot, None)
  }

  pub fn same_pairing(&self, other: &Match) -> bool {
    self.slot_a == other.slot_a && self.slot_b == other.slot_b
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
  pub side: Side,
  pub stage: Stage,
  pub matches: Vec<Match>,
}

impl Round {
  pub fn new(stage: Stage, matches: Vec<Match>) -> Self {
    Round { side: stage.side(), stage, matches }
  }

  /// A round of `capacity` empty matches, as it looks before anything is built.
  pub fn unbuilt(stage: Stage) -> Self {
    Round::new(stage, vec![Match::empty(); stage.capacity()])
  }

  /// Winner per match, by position.
  pub fn winners(&self) -> Vec<Option<Participant>> {
    self.matches.iter().map(|m| m.winner.clone()).collect()
  }

  pub fn resolved_winners(&self) -> Vec<Participant> {
    self.matches.iter().filter_map(|m| m.winner.clone()).collect()
  }

  pub fn is_built(&self) -> bool {
    self.matches.iter().any(|m| m.state() != MatchState::Empty)
  }
}
