//! Meeting API endpoints.
//!
//! Provides HTTP endpoints for:
//! - Starting a meeting (POST /meetings)
//! - Listing meetings (GET /meetings)
//! - Snapshots, paged transcripts and exports of one meeting
//! - Initiator control (POST /meetings/:id/{pause,resume,stop,skip,conclude})
//! - Initiator heartbeat (POST /meetings/:id/heartbeat)
//! - The observer websocket (GET /meetings/:id/ws)

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::export::ExportFormat;
use crate::meeting::{
    ControlAck, ControlCommand, MeetingConfig, MeetingError, SessionSnapshot, SessionSummary,
    StartedMeeting,
};

use super::{observe, AppState};

/// Header carrying the control token returned by `POST /meetings`.
pub const CONTROL_TOKEN_HEADER: &str = "x-control-token";

const DEFAULT_PAGE_LIMIT: usize = 100;
const MAX_PAGE_LIMIT: usize = 1000;

#[derive(Debug, Deserialize, Default)]
pub struct TranscriptQueryParams {
    pub offset: Option<usize>,
    /// Maximum entries (default 100, at most 1000)
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ExportQueryParams {
    /// `markdown` (default) or `json`
    pub format: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(start_meeting).get(list_meetings))
        .route("/:id", get(get_meeting))
        .route("/:id/transcript", get(get_transcript))
        .route("/:id/export", get(export_meeting))
        .route("/:id/pause", post(pause_meeting))
        .route("/:id/resume", post(resume_meeting))
        .route("/:id/stop", post(stop_meeting))
        .route("/:id/skip", post(skip_turn))
        .route("/:id/conclude", post(conclude_meeting))
        .route("/:id/heartbeat", post(heartbeat))
        .route("/:id/ws", get(observe::ws_handler))
        .with_state(state)
}

/// POST /meetings - Validate a meeting config and start it.
async fn start_meeting(
    State(registry): State<AppState>,
    Json(config): Json<MeetingConfig>,
) -> ApiResult<(StatusCode, Json<StartedMeeting>)> {
    info!("Meeting start requested via API: \"{}\"", config.topic);
    let started = registry.start(config).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// GET /meetings - Summaries of retained meetings.
async fn list_meetings(State(registry): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(registry.list().await)
}

/// GET /meetings/:id - Full snapshot.
async fn get_meeting(
    State(registry): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionSnapshot>> {
    let handle = registry.get(id).await?;
    Ok(Json(handle.snapshot().await))
}

/// GET /meetings/:id/transcript - Paged transcript entries.
async fn get_transcript(
    State(registry): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<TranscriptQueryParams>,
) -> ApiResult<Json<Value>> {
    let handle = registry.get(id).await?;
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    let (entries, total) = handle.page(offset, limit).await;

    Ok(Json(json!({
        "session_id": id,
        "offset": offset,
        "limit": limit,
        "total": total,
        "entries": entries,
    })))
}

/// GET /meetings/:id/export - Markdown or JSON document.
async fn export_meeting(
    State(registry): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ExportQueryParams>,
) -> ApiResult<Response> {
    let format = match params.format.as_deref() {
        Some(raw) => raw.parse::<ExportFormat>().map_err(ApiError::bad_request)?,
        None => ExportFormat::default(),
    };
    let handle = registry.get(id).await?;
    let body = handle.export(format).await;

    Ok(([(header::CONTENT_TYPE, format.content_type())], body).into_response())
}

async fn pause_meeting(
    State(registry): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<ControlAck>> {
    control(&registry, id, &headers, ControlCommand::Pause).await
}

async fn resume_meeting(
    State(registry): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<ControlAck>> {
    control(&registry, id, &headers, ControlCommand::Resume).await
}

async fn stop_meeting(
    State(registry): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<ControlAck>> {
    control(&registry, id, &headers, ControlCommand::Stop).await
}

async fn skip_turn(
    State(registry): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<ControlAck>> {
    control(&registry, id, &headers, ControlCommand::Skip).await
}

async fn conclude_meeting(
    State(registry): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<ControlAck>> {
    control(&registry, id, &headers, ControlCommand::Conclude).await
}

/// POST /meetings/:id/heartbeat - Keep the idle policy from pausing the meeting.
async fn heartbeat(
    State(registry): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let handle = registry.get(id).await?;
    handle.heartbeat(control_token(&headers)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn control_token(headers: &HeaderMap) -> Result<&str, MeetingError> {
    headers
        .get(CONTROL_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(MeetingError::NotInitiator)
}

async fn control(
    registry: &AppState,
    id: Uuid,
    headers: &HeaderMap,
    command: ControlCommand,
) -> ApiResult<Json<ControlAck>> {
    let handle = registry.get(id).await?;
    let token = control_token(headers)?;

    info!("Meeting {} {} command received via API", id, command.as_str());
    let ack = handle.control(token, command).await?;
    Ok(Json(ack))
}
