use thiserror::Error;

use crate::model::{Participant, Stage};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BracketError {
  #[error("{participant} is not in this match")]
  InvalidWinner { participant: Participant },

  #[error("{stage} needs at least two resolved participants, found {found}")]
  InsufficientInput { stage: Stage, found: usize },

  #[error("{stage}: {reason}")]
  StructuralMismatch { stage: Stage, reason: String },

  #[error("invalid entrants: {0}")]
  InvalidEntrants(String),

  #[error("no match {index} in {stage}")]
  MatchNotFound { stage: Stage, index: usize },

  #[error("{stage} is not a final")]
  NotAFinal { stage: Stage },
}

impl BracketError {
  pub fn mismatch(stage: Stage, reason: impl Into<String>) -> Self {
    BracketError::StructuralMismatch { stage, reason: reason.into() }
  }

  /// True when the bracket itself was fine but the caller pointed at something absent.
  pub fn is_lookup(&self) -> bool {
    matches!(self, BracketError::MatchNotFound { .. })
  }
}

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid tournament id: {0:?}")]
  InvalidId(String),

  #[error("store lock poisoned")]
  Poisoned,
}

/// Everything an admin operation can fail with.
#[derive(Error, Debug)]
pub enum DeskError {
  #[error(transparent)]
  Bracket(#[from] BracketError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("no bracket for tournament {0}")]
  BracketNotFound(String),
}
