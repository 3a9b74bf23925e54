use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};

use crate::model::Participant;
use crate::store::BracketStore;

// ── Constants ──────────────────────────────────────────────────────────

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:17880";
pub const DEFAULT_DATA_DIR: &str = "data/brackets";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "bracket-desk.log";

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedBracketStore = Arc<dyn BracketStore>;

// ── Config ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: String,
    pub static_dir: String,
    pub log_dir: String,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: String::new(),
            data_dir: String::new(),
            static_dir: String::new(),
            log_dir: String::new(),
            log_filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub data_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub log_dir: PathBuf,
}

#[derive(Clone)]
pub struct AdminServerState {
    pub store: SharedBracketStore,
}

// ── Request payloads ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBracketRequest {
    pub entrants: Vec<Participant>,
    #[serde(default)]
    pub seeded: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordWinnerRequest {
    pub participant: Participant,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignSlotRequest {
    #[serde(default)]
    pub participant: Option<Participant>,
}

// ── Response payloads ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentList {
    pub tournaments: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
}
