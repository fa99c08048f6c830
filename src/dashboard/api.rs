use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crisis_common::{RunPhase, WaveFile};
use serde::Deserialize;

use crate::errors::{FeedError, RunError};
use crate::feed::{FeedQueue, WaveLoader, wave_file_name};
use crate::response_log::ResponseLog;
use crate::runner::RunController;
use crate::state::RunState;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub run_state: Arc<RunState>,
    pub runner: RunController,
    pub feed: FeedQueue,
    pub loader: Arc<dyn WaveLoader>,
    pub response_log: ResponseLog,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct EventsQuery {
    /// Only return events with a greater id
    pub after: Option<u64>,
}

#[derive(Deserialize)]
pub struct AppendLogRequest {
    pub entry: String,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::AlreadyRunning => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/events", get(get_events))
        .route("/decisions", get(get_decisions))
        .route("/run", post(run_crew))
        .route("/logs", get(get_logs).post(append_log))
        .route("/tweets/{wave}", get(get_tweets))
        .route("/inject-crisis/{wave}", post(inject_crisis))
        .route("/feed/stop", post(stop_feed))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "message": "Crisis relay running"}))
}

async fn get_status(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.run_state.status()?))
}

async fn get_events(
    State(state): State<SharedState>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let events = match query.after {
        Some(after) => state.run_state.events_since(after)?,
        None => state.run_state.events()?,
    };
    Ok(Json(serde_json::json!({"events": events})))
}

async fn get_decisions(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.run_state.ledger()?))
}

/// Run the crew to completion. The request waits for the whole run.
async fn run_crew(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let outcome = state.runner.run().await?;
    if outcome.status.status == RunPhase::Completed {
        return Ok(Json(serde_json::json!({
            "status": "completed",
            "final_output": outcome.status.final_output,
            "events": outcome.events,
        }))
        .into_response());
    }

    let message = outcome
        .error
        .or(outcome.status.final_output)
        .unwrap_or_default();
    Ok((
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"status": "error", "message": message})),
    )
        .into_response())
}

async fn get_logs(State(state): State<SharedState>) -> impl IntoResponse {
    let logs = state.response_log.entries().await;
    Json(serde_json::json!({"logs": logs}))
}

async fn append_log(
    State(state): State<SharedState>,
    Json(req): Json<AppendLogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .response_log
        .append_line(&req.entry)
        .await
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_tweets(
    State(state): State<SharedState>,
    Path(wave): Path<u32>,
) -> Result<impl IntoResponse, ApiError> {
    let file = state
        .loader
        .load_file(wave)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} not found", wave_file_name(wave))))?;
    let effective = file.wave.unwrap_or(wave);
    Ok(Json(WaveFile {
        wave: Some(effective),
        tweets: file.into_items(wave),
    }))
}

async fn inject_crisis(
    State(state): State<SharedState>,
    Path(wave): Path<u32>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state
        .feed
        .try_inject_wave(wave)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Wave {} not found", wave)))?;
    Ok(Json(serde_json::json!({
        "status": "injected",
        "wave": wave,
        "count": count,
    })))
}

async fn stop_feed(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    state.feed.stop()?;
    Ok(Json(serde_json::json!({"status": "stopped"})))
}
