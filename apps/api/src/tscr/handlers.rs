use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;
use crate::tscr::fast_path::MoreReply;
use crate::tscr::keyword_cache::CacheStats;

#[derive(Debug, Deserialize)]
pub struct SessionReplyRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionReplyResponse {
    /// False when the message was not an affirmation and the caller should
    /// route it elsewhere.
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<MoreReply>,
}

/// GET /api/v1/cache
pub async fn handle_cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.keyword_cache.snapshot().await.stats())
}

/// POST /api/v1/cache/refresh
/// Rebuilds the keyword cache from active jobs and swaps it in.
pub async fn handle_refresh_cache(
    State(state): State<AppState>,
) -> Result<Json<CacheStats>, AppError> {
    if !state.config.keyword_cache_enabled {
        return Err(AppError::Conflict(
            "Keyword cache is disabled (KEYWORD_CACHE_ENABLED=false)".to_string(),
        ));
    }
    Ok(Json(state.keyword_cache.rebuild(&state.db).await?))
}

/// DELETE /api/v1/sessions/:id
/// Cancels the session's background loads and drops its pending results.
pub async fn handle_end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.fast_path.end_session(&session_id).await {
        tracing::info!(session_id = %session_id, "Session ended");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {session_id} not found")))
    }
}

/// POST /api/v1/sessions/:id/reply
/// An affirmation ("yes", "tell me more") after a teaser returns the full
/// results for the session's last query.
pub async fn handle_session_reply(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SessionReplyRequest>,
) -> Result<Json<SessionReplyResponse>, AppError> {
    let reply = state.fast_path.follow_up(&session_id, &req.message).await?;
    Ok(Json(SessionReplyResponse {
        handled: reply.is_some(),
        reply,
    }))
}
