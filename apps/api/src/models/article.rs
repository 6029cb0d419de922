use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Card shape of a published article, used by the featured-articles tool.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ArticleCardRow {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub url: String,
    pub source_name: String,
    pub summary: String,
    pub category: String,
    pub image_url: Option<String>,
    pub image_photographer: Option<String>,
    pub imported_at: DateTime<Utc>,
}
