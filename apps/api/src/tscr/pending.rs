//! Pending full-results store for the two-stage lookup.
//!
//! The background load deposits results under the session key; the
//! follow-up request takes them. A take removes the entry, so a given
//! result set is handed out at most once.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::Client as RedisClient;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::job::JobSummary;

const REDIS_KEY_PREFIX: &str = "tscr:pending:";

#[derive(Debug, Error)]
pub enum PendingError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to (de)serialize pending results: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Full results for one query, loaded after the teaser was spoken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullResults {
    pub query: String,
    pub jobs: Vec<JobSummary>,
    pub loaded_at: DateTime<Utc>,
}

impl FullResults {
    pub fn new(query: impl Into<String>, jobs: Vec<JobSummary>) -> Self {
        Self {
            query: query.into(),
            jobs,
            loaded_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait PendingResults: Send + Sync {
    /// Stores results under `key`, replacing anything already there.
    async fn put(&self, key: &str, results: FullResults) -> Result<(), PendingError>;

    /// Removes and returns the entry for `key`. Expired entries read as absent.
    async fn take(&self, key: &str) -> Result<Option<FullResults>, PendingError>;

    async fn discard(&self, key: &str) -> Result<(), PendingError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-process store
// ────────────────────────────────────────────────────────────────────────────

pub struct InMemoryPendingStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, FullResults)>>,
}

impl InMemoryPendingStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl PendingResults for InMemoryPendingStore {
    async fn put(&self, key: &str, results: FullResults) -> Result<(), PendingError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (expires, _)| *expires > now);
        entries.insert(key.to_string(), (now + self.ttl, results));
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<FullResults>, PendingError> {
        let entry = self.entries.lock().await.remove(key);
        Ok(entry
            .filter(|(expires, _)| *expires > Instant::now())
            .map(|(_, results)| results))
    }

    async fn discard(&self, key: &str) -> Result<(), PendingError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis store
// ────────────────────────────────────────────────────────────────────────────

/// Shares pending results across API replicas. Expiry is left to Redis.
pub struct RedisPendingStore {
    client: RedisClient,
    ttl_secs: u64,
}

impl RedisPendingStore {
    pub fn new(client: RedisClient, ttl: Duration) -> Self {
        Self {
            client,
            ttl_secs: ttl.as_secs().max(1),
        }
    }

    fn key(key: &str) -> String {
        format!("{REDIS_KEY_PREFIX}{key}")
    }
}

#[async_trait]
impl PendingResults for RedisPendingStore {
    async fn put(&self, key: &str, results: FullResults) -> Result<(), PendingError> {
        let payload = serde_json::to_string(&results)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("SET")
            .arg(Self::key(key))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<FullResults>, PendingError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(Self::key(key))
            .query_async(&mut conn)
            .await?;
        raw.map(|payload| serde_json::from_str(&payload))
            .transpose()
            .map_err(PendingError::from)
    }

    async fn discard(&self, key: &str) -> Result<(), PendingError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("DEL")
            .arg(Self::key(key))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}
