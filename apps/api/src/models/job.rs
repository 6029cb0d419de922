use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Projection of an active job used to build the keyword cache.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobTeaserRow {
    pub id: Uuid,
    pub title: String,
    pub company_name: String,
    pub location: Option<String>,
    pub role_category: String,
    pub teaser_hook: Option<String>,
    pub salary_max: Option<i32>,
    pub topic_keywords: Vec<String>,
}

/// Job card returned by full searches and tool calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct JobSummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub company_name: String,
    pub location: Option<String>,
    pub role_category: String,
    pub description_snippet: String,
    pub url: String,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
}
