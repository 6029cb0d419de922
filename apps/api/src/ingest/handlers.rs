use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::ingest::pipeline::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::ingest::recruiter::{PatternType, RecruiterFilter, RecruiterMatch};
use crate::ingest::store::{
    deactivate_recruiter, list_recruiters, recent_runs, upsert_recruiter, ImportStore,
    PgImportStore,
};
use crate::ingest::types::{ClassificationResult, RawRecord, RecordKind};
use crate::models::import_run::ImportRunRow;
use crate::models::recruiter::KnownRecruiterRow;
use crate::state::AppState;

const DEFAULT_RUNS_LIMIT: i64 = 20;
const MAX_RUNS_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct RunsQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/imports
pub async fn handle_list_runs(
    State(state): State<AppState>,
    Query(params): Query<RunsQuery>,
) -> Result<Json<Vec<ImportRunRow>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RUNS_LIMIT)
        .clamp(1, MAX_RUNS_LIMIT);
    Ok(Json(recent_runs(&state.db, limit).await?))
}

/// GET /api/v1/recruiters
pub async fn handle_list_recruiters(
    State(state): State<AppState>,
) -> Result<Json<Vec<KnownRecruiterRow>>, AppError> {
    Ok(Json(list_recruiters(&state.db).await?))
}

#[derive(Deserialize)]
pub struct CheckQuery {
    pub company: String,
    pub description: Option<String>,
    pub source: Option<String>,
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub company: String,
    pub is_recruiter: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<RecruiterMatch>,
}

/// GET /api/v1/recruiters/check?company=
/// Runs the full heuristic filter against the current pattern table.
pub async fn handle_check_recruiter(
    State(state): State<AppState>,
    Query(params): Query<CheckQuery>,
) -> Result<Json<CheckResponse>, AppError> {
    if params.company.trim().is_empty() {
        return Err(AppError::Validation("company must not be empty".to_string()));
    }

    let patterns = PgImportStore::new(state.db.clone())
        .load_recruiter_patterns()
        .await?;
    let matched = RecruiterFilter::new(patterns).check(
        &params.company,
        params.description.as_deref(),
        params.source.as_deref().unwrap_or("manual"),
    );

    Ok(Json(CheckResponse {
        company: params.company,
        is_recruiter: matched.is_some(),
        matched,
    }))
}

#[derive(Deserialize)]
pub struct FlagRecruiterRequest {
    pub company_name: String,
    #[serde(default)]
    pub pattern_type: Option<PatternType>,
    pub reason: Option<String>,
    pub flagged_by: Option<String>,
}

/// POST /api/v1/recruiters
pub async fn handle_flag_recruiter(
    State(state): State<AppState>,
    Json(req): Json<FlagRecruiterRequest>,
) -> Result<(StatusCode, Json<KnownRecruiterRow>), AppError> {
    if req.company_name.trim().is_empty() {
        return Err(AppError::Validation(
            "company_name must not be empty".to_string(),
        ));
    }

    let row = upsert_recruiter(
        &state.db,
        &req.company_name,
        req.pattern_type.unwrap_or(PatternType::Contains),
        req.reason.as_deref(),
        req.flagged_by.as_deref().unwrap_or("admin"),
    )
    .await?;

    tracing::info!(
        company = %row.company_name,
        pattern_type = %row.pattern_type,
        "Recruiter pattern saved"
    );
    Ok((StatusCode::CREATED, Json(row)))
}

/// DELETE /api/v1/recruiters/:id
pub async fn handle_delete_recruiter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if deactivate_recruiter(&state.db, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Recruiter pattern {id} not found")))
    }
}

#[derive(Deserialize)]
pub struct ClassifyPreviewRequest {
    #[serde(default = "default_kind")]
    pub kind: RecordKind,
    pub title: String,
    pub organization: String,
    pub location: Option<String>,
    #[serde(default)]
    pub description: String,
    pub source: Option<String>,
    pub confidence_threshold: Option<f64>,
}

fn default_kind() -> RecordKind {
    RecordKind::Job
}

#[derive(Serialize)]
pub struct ClassifyPreviewResponse {
    pub classification: ClassificationResult,
    pub threshold: f64,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recruiter: Option<RecruiterMatch>,
}

/// POST /api/v1/imports/classify
/// Shows how a single posting would be classified, without persisting it.
pub async fn handle_preview_classification(
    State(state): State<AppState>,
    Json(req): Json<ClassifyPreviewRequest>,
) -> Result<Json<ClassifyPreviewResponse>, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    let threshold = req.confidence_threshold.unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AppError::Validation(
            "confidence_threshold must be between 0 and 1".to_string(),
        ));
    }

    let source = req.source.unwrap_or_else(|| "manual".to_string());
    let recruiter = match req.kind {
        RecordKind::Job => {
            let patterns = PgImportStore::new(state.db.clone())
                .load_recruiter_patterns()
                .await?;
            RecruiterFilter::new(patterns).check(
                &req.organization,
                Some(req.description.as_str()),
                &source,
            )
        }
        RecordKind::News => None,
    };

    let record = RawRecord {
        kind: req.kind,
        title: req.title,
        organization: req.organization,
        location: req.location,
        description: req.description,
        url: String::new(),
        salary_min: None,
        salary_max: None,
        source,
        external_id: String::new(),
        published_date: None,
        image_url: None,
    };
    let classification = state.classifier.classify(&record).await?;
    let accepted =
        recruiter.is_none() && classification.is_relevant && classification.score >= threshold;

    Ok(Json(ClassifyPreviewResponse {
        classification,
        threshold,
        accepted,
        recruiter,
    }))
}
