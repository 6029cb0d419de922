//! Full (slow-path) job search.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::job::JobSummary;
use crate::normalize::{find_location_in, RoleCategory};
use crate::tscr::keyword_cache::{is_stopword, normalize_text};

pub const FULL_RESULTS_LIMIT: i64 = 10;

/// Structured reading of a free-text query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchFilters {
    pub role: Option<RoleCategory>,
    pub location: Option<&'static str>,
    /// Free-text terms, used only when neither role nor location was found.
    pub terms: Vec<String>,
}

impl SearchFilters {
    pub fn parse(query: &str) -> Self {
        let role = RoleCategory::find_in(query);
        let location = find_location_in(query);
        let terms = if role.is_none() && location.is_none() {
            normalize_text(query)
                .split(' ')
                .filter(|t| t.chars().count() > 2 && !is_stopword(t))
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };
        Self {
            role,
            location,
            terms,
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.role.is_none() && self.location.is_none() && self.terms.is_empty()
    }
}

#[async_trait]
pub trait FullSearch: Send + Sync {
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<JobSummary>, AppError>;
}

pub struct PgJobSearch {
    db: PgPool,
}

impl PgJobSearch {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FullSearch for PgJobSearch {
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<JobSummary>, AppError> {
        let filters = SearchFilters::parse(query);
        tracing::debug!(?filters, "Full job search");

        let terms = (!filters.terms.is_empty()).then_some(filters.terms);
        let rows = sqlx::query_as::<_, JobSummary>(
            r#"
            SELECT id, slug, title, company_name, location, role_category,
                   description_snippet, url, salary_min, salary_max
            FROM jobs
            WHERE is_active = TRUE
              AND ($1::text IS NULL OR role_category = $1)
              AND ($2::text IS NULL OR location ILIKE '%' || $2 || '%')
              AND ($3::text[] IS NULL OR EXISTS (
                    SELECT 1 FROM unnest($3::text[]) AS term
                    WHERE title ILIKE '%' || term || '%'
                       OR company_name ILIKE '%' || term || '%'
                       OR description_snippet ILIKE '%' || term || '%'
                       OR term = ANY(topic_keywords)))
            ORDER BY imported_at DESC
            LIMIT $4
            "#,
        )
        .bind(filters.role.map(|r| r.as_str()))
        .bind(filters.location)
        .bind(terms)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}
