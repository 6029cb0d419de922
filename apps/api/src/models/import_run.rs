use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ImportRunRow {
    pub id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items_fetched: i32,
    pub items_filtered: i32,
    pub items_duplicates: i32,
    pub items_inserted: i32,
    pub items_errored: i32,
    pub status: String,
    pub error_message: Option<String>,
    pub metadata: Value,
}
