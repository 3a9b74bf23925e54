use chrono::Utc;
use std::{
  collections::HashMap,
  fs,
  path::{Path, PathBuf},
  sync::Mutex,
};
use tracing::debug;

use crate::bracket::BracketState;
use crate::error::StoreError;

/// Loads and saves whole bracket documents. Saves replace the stored document
/// outright; there are no partial updates and no version checks.
pub trait BracketStore: Send + Sync {
  fn load(&self, tournament_id: &str) -> Result<Option<BracketState>, StoreError>;
  fn save(&self, tournament_id: &str, state: &BracketState) -> Result<BracketState, StoreError>;
  fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// Tournament ids double as file names, so they are restricted to `[a-z0-9-_]`.
pub fn validate_tournament_id(raw: &str) -> Result<&str, StoreError> {
  let trimmed = raw.trim();
  let valid = !trimmed.is_empty()
    && trimmed.len() <= 64
    && trimmed
      .chars()
      .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
  if valid {
    Ok(trimmed)
  } else {
    Err(StoreError::InvalidId(raw.to_string()))
  }
}

fn stamped(tournament_id: &str, state: &BracketState) -> BracketState {
  let mut next = state.clone();
  next.tournament_id = tournament_id.to_string();
  next.saved_at = Some(Utc::now());
  next
}

pub struct JsonFileStore {
  dir: PathBuf,
  write_lock: Mutex<()>,
}

impl JsonFileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let dir = dir.into();
    fs::create_dir_all(&dir)?;
    Ok(JsonFileStore {
      dir,
      write_lock: Mutex::new(()),
    })
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path_for(&self, tournament_id: &str) -> Result<PathBuf, StoreError> {
    let id = validate_tournament_id(tournament_id)?;
    Ok(self.dir.join(format!("{id}.json")))
  }
}

impl BracketStore for JsonFileStore {
  fn load(&self, tournament_id: &str) -> Result<Option<BracketState>, StoreError> {
    let path = self.path_for(tournament_id)?;
    if !path.is_file() {
      return Ok(None);
    }
    let data = fs::read_to_string(&path)?;
    let state = serde_json::from_str::<BracketState>(&data)?;
    Ok(Some(state))
  }

  fn save(&self, tournament_id: &str, state: &BracketState) -> Result<BracketState, StoreError> {
    let path = self.path_for(tournament_id)?;
    let next = stamped(validate_tournament_id(tournament_id)?, state);
    let payload = serde_json::to_string_pretty(&next)?;
    // Saves in this process queue up; the rename swaps the whole file in at once.
    let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, payload)?;
    fs::rename(&staging, &path)?;
    debug!("saved bracket {}", path.display());
    Ok(next)
  }

  fn list(&self) -> Result<Vec<String>, StoreError> {
    let mut out = Vec::new();
    for entry in fs::read_dir(&self.dir)? {
      let path = entry?.path();
      if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        continue;
      }
      if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        if validate_tournament_id(stem).is_ok() {
          out.push(stem.to_string());
        }
      }
    }
    out.sort();
    Ok(out)
  }
}

#[derive(Default)]
pub struct MemoryStore {
  brackets: Mutex<HashMap<String, BracketState>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    MemoryStore::default()
  }
}

impl BracketStore for MemoryStore {
  fn load(&self, tournament_id: &str) -> Result<Option<BracketState>, StoreError> {
    let id = validate_tournament_id(tournament_id)?;
    let guard = self.brackets.lock().map_err(|_| StoreError::Poisoned)?;
    Ok(guard.get(id).cloned())
  }

  fn save(&self, tournament_id: &str, state: &BracketState) -> Result<BracketState, StoreError> {
    let id = validate_tournament_id(tournament_id)?;
    let next = stamped(id, state);
    let mut guard = self.brackets.lock().map_err(|_| StoreError::Poisoned)?;
    guard.insert(id.to_string(), next.clone());
    Ok(next)
  }

  fn list(&self) -> Result<Vec<String>, StoreError> {
    let guard = self.brackets.lock().map_err(|_| StoreError::Poisoned)?;
    let mut ids: Vec<String> = guard.keys().cloned().collect();
    ids.sort();
    Ok(ids)
  }
}
