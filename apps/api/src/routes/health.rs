use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a status object with service version and keyword cache size.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let cache = state.keyword_cache.snapshot().await.stats();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "fractional-api",
        "keyword_cache": {
            "enabled": state.config.keyword_cache_enabled,
            "keywords": cache.keywords,
            "jobs": cache.jobs,
        },
        "active_sessions": state.fast_path.sessions().len().await,
    }))
}
