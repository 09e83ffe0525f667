//! HTTP request handlers
//!
//! Thin wrappers over [`DjSession`](crate::session::DjSession) operations.

use crate::api::server::AppContext;
use crate::error::{Error, QueueError};
use crate::state::SessionStatus;
use aidj_common::models::{AnnouncementRequest, EventPlan, MoodSample, Priority, Track, TrackId};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

type ApiError = (StatusCode, Json<StatusResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    track_id: String,
}

#[derive(Debug, Serialize)]
pub struct PlayResponse {
    status: String,
    track: Track,
}

#[derive(Debug, Deserialize)]
pub struct AnnounceRequest {
    text: String,
    #[serde(default = "default_priority")]
    priority: Priority,
}

fn default_priority() -> Priority {
    Priority::Medium
}

#[derive(Debug, Serialize)]
pub struct AnnounceResponse {
    status: String,
    announcement_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AnnouncementsResponse {
    now_speaking: Option<AnnouncementRequest>,
    pending: Vec<AnnouncementRequest>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    status: String,
    count: usize,
}

#[derive(Debug, Serialize)]
pub struct MoodResponse {
    sampling_enabled: bool,
    sample: Option<MoodSample>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    tracks: Vec<Track>,
}

#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    active_phase: Option<usize>,
    plan: EventPlan,
}

fn message(text: impl Into<String>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: text.into(),
    })
}

/// Map an engine error onto an HTTP status
fn error_response(e: Error) -> ApiError {
    let code = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) | Error::Queue(QueueError::EmptyText) => StatusCode::BAD_REQUEST,
        Error::InvalidState(_) | Error::Queue(QueueError::Closed) => StatusCode::CONFLICT,
        Error::Queue(QueueError::Full(_)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if code.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    (code, message(format!("error: {}", e)))
}

// ============================================================================
// Health & Status
// ============================================================================

/// GET /health - Health check with build information
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "aidj-engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        port: ctx.port,
    })
}

/// GET /status - Full session snapshot
pub async fn status(State(ctx): State<AppContext>) -> Json<SessionStatus> {
    Json(ctx.session.status())
}

// ============================================================================
// Session Lifecycle
// ============================================================================

/// POST /session/start
pub async fn start_session(
    State(ctx): State<AppContext>,
) -> Result<Json<StatusResponse>, ApiError> {
    ctx.session.start().await.map_err(error_response)?;
    Ok(message("started"))
}

/// POST /session/stop - Always succeeds; stopping twice is a no-op
pub async fn stop_session(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.session.stop().await;
    message("stopped")
}

// ============================================================================
// Playback
// ============================================================================

/// POST /playback/play - Start a catalog track
///
/// Returns 202: the swap happens once the transition coordinator is idle.
pub async fn play(
    State(ctx): State<AppContext>,
    Json(req): Json<PlayRequest>,
) -> Result<(StatusCode, Json<PlayResponse>), ApiError> {
    let track = ctx
        .session
        .play(&TrackId::new(req.track_id))
        .map_err(error_response)?;
    info!("Play requested: {}", track.label());
    Ok((
        StatusCode::ACCEPTED,
        Json(PlayResponse {
            status: "accepted".to_string(),
            track: Track::clone(&track),
        }),
    ))
}

/// POST /playback/stop
pub async fn stop_playback(
    State(ctx): State<AppContext>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    ctx.session.stop_playback().map_err(error_response)?;
    Ok((StatusCode::ACCEPTED, message("accepted")))
}

/// GET /catalog/search?q=
pub async fn search_catalog(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchQuery>,
) -> Json<SearchResponse> {
    let tracks = ctx
        .session
        .catalog()
        .search(&query.q)
        .into_iter()
        .map(|t| Track::clone(&t))
        .collect();
    Json(SearchResponse { tracks })
}

// ============================================================================
// Mood
// ============================================================================

/// GET /mood - Latest successful sample
pub async fn get_mood(State(ctx): State<AppContext>) -> Json<MoodResponse> {
    Json(MoodResponse {
        sampling_enabled: ctx.session.mood_sampling_enabled(),
        sample: ctx.session.snapshots().mood(),
    })
}

/// POST /mood/sample - Sample on the next heartbeat
pub async fn force_mood_sample(
    State(ctx): State<AppContext>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    if ctx.session.force_mood_sample() {
        Ok((StatusCode::ACCEPTED, message("sample requested")))
    } else {
        Err(error_response(Error::InvalidState(
            "Mood sampling is not configured".to_string(),
        )))
    }
}

// ============================================================================
// Announcements
// ============================================================================

/// GET /announcements - Speaking item and pending queue in speaking order
pub async fn list_announcements(State(ctx): State<AppContext>) -> Json<AnnouncementsResponse> {
    let status = ctx.session.status();
    Json(AnnouncementsResponse {
        now_speaking: status.now_speaking,
        pending: status.pending_announcements,
    })
}

/// POST /announcements - Queue an operator announcement
pub async fn announce(
    State(ctx): State<AppContext>,
    Json(req): Json<AnnounceRequest>,
) -> Result<(StatusCode, Json<AnnounceResponse>), ApiError> {
    let announcement_id = ctx
        .session
        .announce(req.text, req.priority)
        .map_err(error_response)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AnnounceResponse {
            status: "queued".to_string(),
            announcement_id,
        }),
    ))
}

/// POST /announcements/cancel - Stop the speaking announcement
pub async fn cancel_announcement(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    if ctx.session.cancel_announcement() {
        message("cancelled")
    } else {
        message("nothing speaking")
    }
}

/// POST /announcements/clear - Drop every pending announcement
pub async fn clear_announcements(State(ctx): State<AppContext>) -> Json<CountResponse> {
    let count = ctx.session.clear_announcements();
    Json(CountResponse {
        status: "cleared".to_string(),
        count,
    })
}

// ============================================================================
// Timeline
// ============================================================================

/// GET /timeline - Event plan with moment flags and the active phase
pub async fn get_timeline(State(ctx): State<AppContext>) -> Json<TimelineResponse> {
    Json(TimelineResponse {
        active_phase: ctx.session.snapshots().active_phase(),
        plan: ctx.session.timeline().plan(),
    })
}
