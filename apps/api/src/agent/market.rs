//! Market views behind the chart and dashboard tools.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::models::article::ArticleCardRow;
use crate::tscr::teaser::format_salary;

pub const CHART_PALETTE: [&str; 8] = [
    "#6366f1", "#8b5cf6", "#a855f7", "#d946ef", "#ec4899", "#f43f5e", "#f97316", "#eab308",
];

const TOP_ROLES: usize = 5;
pub const DEFAULT_FEATURED_ARTICLES: i64 = 4;
pub const MAX_FEATURED_ARTICLES: i64 = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub name: String,
    pub jobs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart<T> {
    pub chart_data: Vec<T>,
    pub title: &'static str,
    pub subtitle: &'static str,
}

/// Bar chart of active jobs per role, coloured from the palette in order.
pub fn role_chart(counts: Vec<(String, i64)>) -> Chart<ChartPoint> {
    Chart {
        chart_data: counts
            .into_iter()
            .enumerate()
            .map(|(i, (name, jobs))| ChartPoint {
                name,
                jobs,
                fill: Some(CHART_PALETTE[i % CHART_PALETTE.len()]),
            })
            .collect(),
        title: "Fractional Executive Roles Distribution",
        subtitle: "Live data from active listings",
    }
}

pub fn location_chart(counts: Vec<(String, i64)>) -> Chart<ChartPoint> {
    Chart {
        chart_data: counts
            .into_iter()
            .map(|(name, jobs)| ChartPoint {
                name,
                jobs,
                fill: None,
            })
            .collect(),
        title: "Jobs by Location",
        subtitle: "Geographic distribution of active listings",
    }
}

pub async fn count_by_role(pool: &PgPool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT role_category, COUNT(*)
        FROM jobs
        WHERE is_active = TRUE
        GROUP BY role_category
        ORDER BY COUNT(*) DESC, role_category
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn count_by_location(pool: &PgPool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT COALESCE(NULLIF(location, ''), 'Unspecified') AS place, COUNT(*)
        FROM jobs
        WHERE is_active = TRUE
        GROUP BY place
        ORDER BY COUNT(*) DESC, place
        "#,
    )
    .fetch_all(pool)
    .await
}

// ────────────────────────────────────────────────────────────────────────────
// Day rates
// ────────────────────────────────────────────────────────────────────────────

/// Market day-rate range for one role, in pounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayRateBand {
    pub role: &'static str,
    pub min: u32,
    pub max: u32,
    pub avg: u32,
}

pub const DAY_RATE_BANDS: [DayRateBand; 8] = [
    DayRateBand { role: "CEO", min: 250, max: 500, avg: 375 },
    DayRateBand { role: "CFO", min: 200, max: 400, avg: 300 },
    DayRateBand { role: "CTO", min: 180, max: 380, avg: 280 },
    DayRateBand { role: "CMO", min: 150, max: 320, avg: 235 },
    DayRateBand { role: "COO", min: 170, max: 350, avg: 260 },
    DayRateBand { role: "CHRO", min: 140, max: 280, avg: 210 },
    DayRateBand { role: "CRO", min: 160, max: 340, avg: 250 },
    DayRateBand { role: "CPO", min: 150, max: 300, avg: 225 },
];

pub fn salary_insights() -> Chart<DayRateBand> {
    Chart {
        chart_data: DAY_RATE_BANDS.to_vec(),
        title: "Fractional Executive Day Rates (£)",
        subtitle: "Market rate ranges by role",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Dashboard
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow)]
pub struct MarketCounts {
    pub total_jobs: i64,
    pub total_companies: i64,
    pub remote_jobs: i64,
    pub avg_salary_max: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_jobs: i64,
    pub total_companies: i64,
    pub remote_jobs: i64,
    pub avg_top_rate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDashboard {
    pub metrics: DashboardMetrics,
    pub top_roles: Vec<RoleCount>,
    pub title: &'static str,
    pub last_updated: DateTime<Utc>,
}

pub fn build_dashboard(counts: MarketCounts, by_role: Vec<(String, i64)>) -> MarketDashboard {
    let avg_top_rate = counts
        .avg_salary_max
        .map(|avg| format_salary(avg.round() as i32))
        .unwrap_or_else(|| "n/a".to_string());

    MarketDashboard {
        metrics: DashboardMetrics {
            total_jobs: counts.total_jobs,
            total_companies: counts.total_companies,
            remote_jobs: counts.remote_jobs,
            avg_top_rate,
        },
        top_roles: by_role
            .into_iter()
            .take(TOP_ROLES)
            .map(|(name, count)| RoleCount { name, count })
            .collect(),
        title: "Fractional Executive Market Dashboard",
        last_updated: Utc::now(),
    }
}

pub async fn market_counts(pool: &PgPool) -> Result<MarketCounts, sqlx::Error> {
    sqlx::query_as::<_, MarketCounts>(
        r#"
        SELECT COUNT(*) AS total_jobs,
               COUNT(DISTINCT company_name) AS total_companies,
               COUNT(*) FILTER (WHERE location ILIKE '%remote%') AS remote_jobs,
               AVG(salary_max)::float8 AS avg_salary_max
        FROM jobs
        WHERE is_active = TRUE
        "#,
    )
    .fetch_one(pool)
    .await
}

/// Most recent published articles.
pub async fn featured_articles(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<ArticleCardRow>, sqlx::Error> {
    sqlx::query_as::<_, ArticleCardRow>(
        r#"
        SELECT id, slug, title, url, source_name, summary, category,
               image_url, image_photographer, imported_at
        FROM news_articles
        WHERE status = 'published'
        ORDER BY imported_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit.clamp(1, MAX_FEATURED_ARTICLES))
    .fetch_all(pool)
    .await
}
