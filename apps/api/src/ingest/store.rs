//! Persistence for the import pipeline.
//!
//! The orchestrator only sees the `ImportStore` trait; `PgImportStore` is the
//! production backend. Admin/status queries used by the HTTP layer are plain
//! functions over the pool.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ingest::pipeline::{ImportStats, RunStatus, MAX_PERSISTED_ERRORS};
use crate::ingest::recruiter::{PatternType, RecruiterPattern};
use crate::ingest::types::{EnrichedRecord, RecordKind};
use crate::models::import_run::ImportRunRow;
use crate::models::recruiter::KnownRecruiterRow;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Final state written to an import run row.
#[derive(Debug, Clone)]
pub struct RunOutcome<'a> {
    pub status: RunStatus,
    pub stats: &'a ImportStats,
    pub error: Option<&'a str>,
}

#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn exists_by_external_id(
        &self,
        kind: RecordKind,
        source: &str,
        external_id: &str,
    ) -> Result<bool, StoreError>;

    async fn exists_by_content_hash(
        &self,
        kind: RecordKind,
        content_hash: &str,
    ) -> Result<bool, StoreError>;

    async fn exists_by_url(&self, kind: RecordKind, url: &str) -> Result<bool, StoreError>;

    async fn insert_record(&self, record: &EnrichedRecord) -> Result<Uuid, StoreError>;

    async fn load_recruiter_patterns(&self) -> Result<Vec<RecruiterPattern>, StoreError>;

    async fn increment_recruiter_block(&self, pattern_id: Uuid) -> Result<(), StoreError>;

    /// Claims a new `running` row for `pipeline`. Returns `None` when another
    /// run of the same pipeline is still running inside the lease window.
    async fn start_run(&self, pipeline: &str, lease: Duration)
        -> Result<Option<Uuid>, StoreError>;

    /// Finalizes a run. Only a row still in `running` is updated.
    async fn complete_run(&self, run_id: Uuid, outcome: RunOutcome<'_>) -> Result<(), StoreError>;
}

fn table_for(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Job => "jobs",
        RecordKind::News => "news_articles",
    }
}

/// PostgreSQL-backed `ImportStore`.
#[derive(Clone)]
pub struct PgImportStore {
    pool: PgPool,
}

impl PgImportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_job(&self, record: &EnrichedRecord) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let raw = &record.raw;
        let long_form = record.long_form.clone().unwrap_or_default();
        let image = record.image.as_ref();

        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, slug, title, company_name, location, description_snippet,
                 role_category, url, salary_min, salary_max, teaser_hook, topic_keywords,
                 full_description, responsibilities, requirements, benefits, about_company,
                 image_url, image_photographer, image_photographer_url, image_source_url,
                 source, external_id, content_hash, is_active, is_fractional)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, TRUE, TRUE)
            "#,
        )
        .bind(id)
        .bind(&record.slug)
        .bind(&raw.title)
        .bind(&raw.organization)
        .bind(&raw.location)
        .bind(&record.enrichment.snippet)
        .bind(record.category.label())
        .bind(&raw.url)
        .bind(raw.salary_min)
        .bind(raw.salary_max)
        .bind(&record.enrichment.teaser)
        .bind(&record.enrichment.keywords)
        .bind(record.long_form.as_ref().map(|l| l.description.clone()))
        .bind(&long_form.responsibilities)
        .bind(&long_form.requirements)
        .bind(&long_form.benefits)
        .bind(&long_form.about_company)
        .bind(image.map(|i| i.url.clone()))
        .bind(image.map(|i| i.photographer.clone()))
        .bind(image.map(|i| i.photographer_url.clone()))
        .bind(image.map(|i| i.source_url.clone()))
        .bind(&raw.source)
        .bind(&raw.external_id)
        .bind(&record.content_hash)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_article(&self, record: &EnrichedRecord) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let raw = &record.raw;
        let image = record.image.as_ref();
        let sentiment = record
            .enrichment
            .sentiment
            .map(|s| s.as_str())
            .unwrap_or("neutral");

        sqlx::query(
            r#"
            INSERT INTO news_articles
                (id, slug, title, url, source_name, published_date, summary, key_insights,
                 category, tags, sentiment, image_url, image_photographer,
                 image_photographer_url, image_source_url, source, external_id, content_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(id)
        .bind(&record.slug)
        .bind(&raw.title)
        .bind(&raw.url)
        .bind(&raw.organization)
        .bind(&raw.published_date)
        .bind(&record.enrichment.snippet)
        .bind(&record.enrichment.key_insights)
        .bind(record.category.label())
        .bind(&record.enrichment.keywords)
        .bind(sentiment)
        .bind(image.map(|i| i.url.clone()).or_else(|| raw.image_url.clone()))
        .bind(image.map(|i| i.photographer.clone()))
        .bind(image.map(|i| i.photographer_url.clone()))
        .bind(image.map(|i| i.source_url.clone()))
        .bind(&raw.source)
        .bind(&raw.external_id)
        .bind(&record.content_hash)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn exists_by_external_id(
        &self,
        kind: RecordKind,
        source: &str,
        external_id: &str,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE source = $1 AND external_id = $2)",
            table_for(kind)
        );
        Ok(sqlx::query_scalar::<_, bool>(&sql)
            .bind(source)
            .bind(external_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn exists_by_content_hash(
        &self,
        kind: RecordKind,
        content_hash: &str,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE content_hash = $1)",
            table_for(kind)
        );
        Ok(sqlx::query_scalar::<_, bool>(&sql)
            .bind(content_hash)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn exists_by_url(&self, kind: RecordKind, url: &str) -> Result<bool, StoreError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE url = $1)",
            table_for(kind)
        );
        Ok(sqlx::query_scalar::<_, bool>(&sql)
            .bind(url)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_record(&self, record: &EnrichedRecord) -> Result<Uuid, StoreError> {
        match record.raw.kind {
            RecordKind::Job => self.insert_job(record).await,
            RecordKind::News => self.insert_article(record).await,
        }
    }

    async fn load_recruiter_patterns(&self) -> Result<Vec<RecruiterPattern>, StoreError> {
        let rows: Vec<(Uuid, String, String)> = sqlx::query_as(
            "SELECT id, company_name, pattern_type FROM known_recruiters WHERE is_active = TRUE",
        )
        .fetch_all(&self.pool)
        .await?;

        let patterns = rows
            .into_iter()
            .filter_map(|(id, company_name, pattern_type)| {
                match pattern_type.parse::<PatternType>() {
                    Ok(pattern_type) => {
                        Some(RecruiterPattern::new(id, &company_name, pattern_type))
                    }
                    Err(_) => {
                        warn!(%id, %pattern_type, "Skipping recruiter pattern with unknown type");
                        None
                    }
                }
            })
            .collect();

        Ok(patterns)
    }

    async fn increment_recruiter_block(&self, pattern_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE known_recruiters SET jobs_blocked = jobs_blocked + 1, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(pattern_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn start_run(
        &self,
        pipeline: &str,
        lease: Duration,
    ) -> Result<Option<Uuid>, StoreError> {
        let run_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent claims for the same pipeline until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(pipeline)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO import_runs (id, pipeline, status)
            SELECT $1, $2, 'running'
            WHERE NOT EXISTS (
                SELECT 1 FROM import_runs
                WHERE pipeline = $2
                  AND status = 'running'
                  AND started_at > NOW() - make_interval(secs => $3)
            )
            "#,
        )
        .bind(run_id)
        .bind(pipeline)
        .bind(lease.as_secs_f64())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        if inserted == 1 {
            info!(%run_id, pipeline, "Claimed import run");
            Ok(Some(run_id))
        } else {
            Ok(None)
        }
    }

    async fn complete_run(&self, run_id: Uuid, outcome: RunOutcome<'_>) -> Result<(), StoreError> {
        let stats = outcome.stats;
        let metadata = json!({
            "errors": stats.errors.iter().take(MAX_PERSISTED_ERRORS).collect::<Vec<_>>(),
            "recruiters_blocked": stats.recruiters_blocked,
            "not_relevant": stats.not_relevant,
            "low_confidence": stats.low_confidence,
        });

        let updated = sqlx::query(
            r#"
            UPDATE import_runs SET
                completed_at = NOW(),
                items_fetched = $2,
                items_filtered = $3,
                items_duplicates = $4,
                items_inserted = $5,
                items_errored = $6,
                status = $7,
                error_message = $8,
                metadata = $9
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(stats.fetched as i32)
        .bind(stats.filtered as i32)
        .bind(stats.duplicates as i32)
        .bind(stats.inserted as i32)
        .bind(stats.errored as i32)
        .bind(outcome.status.as_str())
        .bind(outcome.error)
        .bind(metadata)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            warn!(%run_id, "Import run was already finalized");
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Status and admin queries
// ────────────────────────────────────────────────────────────────────────────

/// Most recent import runs, newest first.
pub async fn recent_runs(pool: &PgPool, limit: i64) -> Result<Vec<ImportRunRow>, StoreError> {
    Ok(sqlx::query_as::<_, ImportRunRow>(
        "SELECT * FROM import_runs ORDER BY started_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

pub async fn list_recruiters(pool: &PgPool) -> Result<Vec<KnownRecruiterRow>, StoreError> {
    Ok(sqlx::query_as::<_, KnownRecruiterRow>(
        "SELECT * FROM known_recruiters ORDER BY jobs_blocked DESC, created_at DESC",
    )
    .fetch_all(pool)
    .await?)
}

/// Inserts a pattern, or refreshes the reason (and reactivates) if it exists.
pub async fn upsert_recruiter(
    pool: &PgPool,
    company_name: &str,
    pattern_type: PatternType,
    reason: Option<&str>,
    flagged_by: &str,
) -> Result<KnownRecruiterRow, StoreError> {
    Ok(sqlx::query_as::<_, KnownRecruiterRow>(
        r#"
        INSERT INTO known_recruiters (id, company_name, pattern_type, reason, flagged_by)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (company_name, pattern_type) DO UPDATE SET
            reason = COALESCE(EXCLUDED.reason, known_recruiters.reason),
            is_active = TRUE,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_name.trim().to_lowercase())
    .bind(pattern_type.as_str())
    .bind(reason)
    .bind(flagged_by)
    .fetch_one(pool)
    .await?)
}

/// Soft-deletes a pattern. Returns false when no such pattern exists.
pub async fn deactivate_recruiter(pool: &PgPool, id: Uuid) -> Result<bool, StoreError> {
    let updated = sqlx::query(
        "UPDATE known_recruiters SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(updated > 0)
}
