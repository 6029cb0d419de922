use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct KnownRecruiterRow {
    pub id: Uuid,
    pub company_name: String,
    pub pattern_type: String,
    pub reason: Option<String>,
    pub flagged_by: String,
    pub is_active: bool,
    pub jobs_blocked: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
