use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::agent::tools::{invoke, ToolOutcome, ToolSpec};
use crate::errors::AppError;
use crate::state::AppState;

/// GET /api/v1/tools
pub async fn handle_list_tools(State(state): State<AppState>) -> Json<Vec<ToolSpec>> {
    Json(state.tools.specs().to_vec())
}

#[derive(Deserialize)]
pub struct InvokeRequest {
    pub session_id: String,
    pub tool: String,
    #[serde(default)]
    pub args: Value,
    /// Page the user currently has open, kept with the session.
    pub page_context: Option<String>,
}

/// POST /api/v1/tools/invoke
/// Malformed calls are rejected with 400; failures while running a tool
/// come back as `ok: false` with a generic message.
pub async fn handle_invoke_tool(
    State(state): State<AppState>,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<ToolOutcome>, AppError> {
    if req.session_id.trim().is_empty() {
        return Err(AppError::Validation("session_id must not be empty".to_string()));
    }
    let command = state.tools.parse(&req.tool, req.args)?;

    if let Some(page) = req.page_context {
        state
            .fast_path
            .sessions()
            .update(&req.session_id, |ctx| ctx.page_context = Some(page))
            .await;
    }

    Ok(Json(
        invoke(&state.db, &state.fast_path, &req.session_id, &command).await,
    ))
}
