use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, get_service, post, put},
    Json, Router,
};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::bracket::{BracketState, BuildReport, FinalMatch, FinalSyncReport, MatchRef, MatchUpdate, StaleMatch};
use crate::commands::{self, Applied};
use crate::error::{BracketError, DeskError, StoreError};
use crate::model::{Slot, Stage};
use crate::types::*;

// ── Errors ─────────────────────────────────────────────────────────────

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

pub fn status_for(err: &DeskError) -> StatusCode {
    match err {
        DeskError::BracketNotFound(_) => StatusCode::NOT_FOUND,
        DeskError::Bracket(e) if e.is_lookup() => StatusCode::NOT_FOUND,
        DeskError::Bracket(BracketError::NotAFinal { .. }) => StatusCode::BAD_REQUEST,
        DeskError::Bracket(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DeskError::Store(StoreError::InvalidId(_)) => StatusCode::BAD_REQUEST,
        DeskError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!("admin request failed: {err}");
        } else {
            warn!("admin request rejected: {err}");
        }
        ApiError { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_stage(raw: &str) -> Result<Stage, ApiError> {
    Stage::parse(raw).ok_or_else(|| ApiError::bad_request(format!("unknown stage {raw:?}")))
}

fn parse_slot(raw: &str) -> Result<Slot, ApiError> {
    Slot::parse(raw).ok_or_else(|| ApiError::bad_request(format!("unknown slot {raw:?}; use a or b")))
}

fn parse_match(stage: &str, index: usize) -> Result<MatchRef, ApiError> {
    Ok(MatchRef::new(parse_stage(stage)?, index))
}

// ── Handlers ───────────────────────────────────────────────────────────

async fn list_tournaments(State(state): State<AdminServerState>) -> ApiResult<TournamentList> {
    let tournaments = commands::list_tournaments(state.store.as_ref())?;
    Ok(Json(TournamentList { tournaments }))
}

async fn get_bracket(
    State(state): State<AdminServerState>,
    Path(id): Path<String>,
) -> ApiResult<BracketState> {
    Ok(Json(commands::load_bracket(state.store.as_ref(), &id)?))
}

async fn create_bracket(
    State(state): State<AdminServerState>,
    Path(id): Path<String>,
    Json(request): Json<CreateBracketRequest>,
) -> ApiResult<BracketState> {
    Ok(Json(commands::create_bracket(state.store.as_ref(), &id, request)?))
}

async fn build_stage(
    State(state): State<AdminServerState>,
    Path((id, stage)): Path<(String, String)>,
) -> ApiResult<Applied<BuildReport>> {
    let stage = parse_stage(&stage)?;
    Ok(Json(commands::build_stage(state.store.as_ref(), &id, stage)?))
}

async fn sync_finals(
    State(state): State<AdminServerState>,
    Path(id): Path<String>,
) -> ApiResult<Applied<Vec<FinalSyncReport>>> {
    Ok(Json(commands::sync_finals(state.store.as_ref(), &id)?))
}

async fn record_winner(
    State(state): State<AdminServerState>,
    Path((id, stage, index)): Path<(String, String, usize)>,
    Json(request): Json<RecordWinnerRequest>,
) -> ApiResult<Applied<MatchUpdate>> {
    let at = parse_match(&stage, index)?;
    Ok(Json(commands::record_winner(state.store.as_ref(), &id, at, &request.participant)?))
}

async fn assign_slot(
    State(state): State<AdminServerState>,
    Path((id, stage, index, slot)): Path<(String, String, usize, String)>,
    Json(request): Json<AssignSlotRequest>,
) -> ApiResult<Applied<MatchUpdate>> {
    let at = parse_match(&stage, index)?;
    let slot = parse_slot(&slot)?;
    Ok(Json(commands::assign_slot(state.store.as_ref(), &id, at, slot, request.participant)?))
}

async fn release_final_slot(
    State(state): State<AdminServerState>,
    Path((id, stage, slot)): Path<(String, String, String)>,
) -> ApiResult<Applied<FinalMatch>> {
    let stage = parse_stage(&stage)?;
    let slot = parse_slot(&slot)?;
    Ok(Json(commands::release_final_slot(state.store.as_ref(), &id, stage, slot)?))
}

async fn reset_dependents(
    State(state): State<AdminServerState>,
    Path((id, stage, index)): Path<(String, String, usize)>,
) -> ApiResult<Applied<Vec<Stage>>> {
    let at = parse_match(&stage, index)?;
    Ok(Json(commands::reset_dependents(state.store.as_ref(), &id, at)?))
}

async fn stale_matches(
    State(state): State<AdminServerState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<StaleMatch>> {
    Ok(Json(commands::stale_matches(state.store.as_ref(), &id)?))
}

// ── Router ─────────────────────────────────────────────────────────────

pub fn admin_router(state: AdminServerState, static_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/tournaments", get(list_tournaments))
        .route("/tournaments/:id/bracket", get(get_bracket).post(create_bracket))
        .route("/tournaments/:id/stages/:stage/build", post(build_stage))
        .route("/tournaments/:id/finals/sync", post(sync_finals))
        .route("/tournaments/:id/matches/:stage/:index/winner", post(record_winner))
        .route("/tournaments/:id/matches/:stage/:index/slots/:slot", put(assign_slot))
        .route("/tournaments/:id/finals/:stage/slots/:slot/release", post(release_final_slot))
        .route("/tournaments/:id/matches/:stage/:index/reset-dependents", post(reset_dependents))
        .route("/tournaments/:id/stale", get(stale_matches))
        .with_state(state);

    let router = Router::new().nest("/api", api);
    let router = match static_dir {
        Some(dir) => router.fallback_service(get_service(ServeDir::new(dir))),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

pub async fn start_admin_server(state: AdminServerState, static_dir: Option<PathBuf>, addr: &str) {
    let app = admin_router(state, static_dir);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("admin server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("admin server listening at http://{addr}/");
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {e}");
        }
        info!("admin server shutting down");
    };
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        error!("admin server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Participant;

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for(&DeskError::BracketNotFound("cup".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&DeskError::Bracket(BracketError::InvalidWinner {
                participant: Participant::new("x"),
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&DeskError::Bracket(BracketError::MatchNotFound {
                stage: Stage::WinnersQf,
                index: 9,
            })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&DeskError::Store(StoreError::InvalidId("..".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DeskError::Store(StoreError::Poisoned)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn path_parsing() {
        assert!(parse_stage("W-QF").is_ok());
        assert!(parse_stage("quarters").is_err());
        assert_eq!(parse_slot("B").ok(), Some(Slot::B));
        assert!(parse_slot("c").is_err());
    }

    #[test]
    fn router_builds_with_and_without_static_dir() {
        let state = AdminServerState {
            store: std::sync::Arc::new(crate::store::MemoryStore::new()),
        };
        let _ = admin_router(state.clone(), None);
        let _ = admin_router(state, Some(PathBuf::from("ui")));
    }
}
