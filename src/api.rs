//! HTTP API endpoints.
//!
//! A thin JSON surface over the same operations the WebSocket protocol exposes, for
//! chat-platform adapters that prefer plain requests. Admin routes sit behind
//! moderator Basic Auth.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{self, ModAuthConfig};
use crate::ledger::{BackfillRequest, LeaderboardFilter, LedgerError};
use crate::state::{AppState, SessionError};
use crate::types::{Environment, SessionId, Side, UserId};
use crate::ws;

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    msg: String,
}

fn error_response(status: StatusCode, code: &'static str, msg: String) -> Response {
    (status, Json(ErrorBody { code, msg })).into_response()
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::NoActiveSession | SessionError::NoGameToday => StatusCode::NOT_FOUND,
            SessionError::SubjectNotFound => StatusCode::NOT_FOUND,
            SessionError::SessionClosed
            | SessionError::DuplicateSession(_)
            | SessionError::EventNotFinal(_) => StatusCode::CONFLICT,
            SessionError::MalformedInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SessionError::Feed(_) => StatusCode::BAD_GATEWAY,
        };
        error_response(status, self.code(), self.to_string())
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::InvalidDate(_) | LedgerError::Toi(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::NothingToBackfill => StatusCode::NOT_FOUND,
            LedgerError::AmbiguousBackfill(_) => StatusCode::CONFLICT,
            _ => {
                tracing::error!("Ledger failure: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.code(), self.to_string())
    }
}

/// Full application router: WebSocket, public API and moderator API
pub fn router(state: Arc<AppState>, auth_config: Arc<ModAuthConfig>) -> Router {
    let admin_routes = Router::new()
        .route(
            "/api/admin/sessions/{channel_id}/check-winner",
            post(check_winner),
        )
        .route("/api/admin/backfill", post(backfill))
        .route("/api/admin/ledger", get(export_ledger))
        .route_layer(middleware::from_fn_with_state(
            auth_config.clone(),
            auth::moderator_auth_middleware,
        ));

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            auth_config,
            auth::moderator_ws_auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/sessions", post(open_session))
        .route("/api/sessions/{channel_id}", get(get_session))
        .route(
            "/api/sessions/{channel_id}/votes",
            post(cast_vote).get(show_votes),
        )
        .route("/api/toi", get(current_toi))
        .route("/api/leaderboard", get(leaderboard))
        .merge(admin_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: Environment,
    pub feed: String,
    pub open_sessions: usize,
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        environment: state.config.environment,
        feed: state.feed.name().to_string(),
        open_sessions: state.store.len().await,
    })
}

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub channel_id: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    pub toi: String,
}

/// POST /api/sessions
pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenSessionRequest>,
) -> Result<Response, SessionError> {
    let session = state
        .open_session(req.channel_id, req.session_id, &req.toi)
        .await?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

/// GET /api/sessions/{channel_id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Response, SessionError> {
    let session = state
        .store
        .snapshot_by_channel(&channel_id)
        .await
        .ok_or(SessionError::NoActiveSession)?;
    Ok(Json(session).into_response())
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub user_id: UserId,
    pub side: Side,
}

/// POST /api/sessions/{channel_id}/votes
pub async fn cast_vote(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Result<Response, SessionError> {
    let change = state
        .on_vote_action(&channel_id, &req.user_id, req.side)
        .await?;
    Ok(Json(change).into_response())
}

/// GET /api/sessions/{channel_id}/votes
pub async fn show_votes(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Response, SessionError> {
    Ok(Json(state.show_votes(&channel_id).await?).into_response())
}

/// GET /api/toi
pub async fn current_toi(State(state): State<Arc<AppState>>) -> Result<Response, SessionError> {
    Ok(Json(state.current_toi().await?).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
    pub season: Option<u32>,
    #[serde(default)]
    pub include_preseason: bool,
}

/// GET /api/leaderboard
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    let filter = LeaderboardFilter {
        season: query.season,
        include_preseason: query.include_preseason,
    };
    Json(state.leaderboard(filter, query.limit).await).into_response()
}

/// POST /api/admin/sessions/{channel_id}/check-winner
pub async fn check_winner(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Response, SessionError> {
    Ok(Json(state.check_winner(&channel_id).await?).into_response())
}

/// POST /api/admin/backfill
pub async fn backfill(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BackfillRequest>,
) -> Result<Response, LedgerError> {
    Ok(Json(state.backfill(&req).await?).into_response())
}

/// GET /api/admin/ledger
pub async fn export_ledger(State(state): State<Arc<AppState>>) -> Response {
    Json(state.ledger.snapshot().await).into_response()
}
