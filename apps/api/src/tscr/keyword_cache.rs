//! Keyword → teaser inverted index over active jobs.
//!
//! Built wholesale from the jobs table and never mutated afterwards.
//! `SharedKeywordCache` publishes a new build by swapping an `Arc`, so
//! readers always see either the previous or the next complete cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::job::{JobSummary, JobTeaserRow};

pub const MIN_KEYWORD_CHARS: usize = 3;
/// Query tokens must be longer than this to be looked up on their own.
const MIN_TOKEN_CHARS: usize = 2;
pub const DEFAULT_MATCH_LIMIT: usize = 3;

/// Words that never act as keys: filler from spoken queries plus terms
/// every listing carries.
const STOPWORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "at", "can", "do", "find", "for", "from",
    "get", "got", "have", "i", "in", "is", "job", "jobs", "looking", "me", "my", "of", "on",
    "or", "please", "role", "roles", "show", "some", "the", "there", "to", "want", "what",
    "with", "you", "your", "fractional", "executive", "opportunity", "opportunities",
];

pub(crate) fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Whole keywords and their individual words are both keys.
fn is_indexable(key: &str) -> bool {
    key.chars().count() >= MIN_KEYWORD_CHARS && !is_stopword(key)
}

/// Lower-cases, replaces punctuation other than `-`/`&` with spaces and
/// collapses whitespace.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '&' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Minimal projection of a persisted job, enough for a spoken teaser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeaserEntry {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub category: String,
    pub hook: Option<String>,
    pub salary_max: Option<i32>,
}

impl From<&JobTeaserRow> for TeaserEntry {
    fn from(row: &JobTeaserRow) -> Self {
        Self {
            id: row.id,
            title: row.title.clone(),
            company: row.company_name.clone(),
            location: row.location.clone().filter(|l| !l.trim().is_empty()),
            category: row.role_category.clone(),
            hook: row.teaser_hook.clone().filter(|h| !h.trim().is_empty()),
            salary_max: row.salary_max,
        }
    }
}

impl From<&JobSummary> for TeaserEntry {
    fn from(job: &JobSummary) -> Self {
        Self {
            id: job.id,
            title: job.title.clone(),
            company: job.company_name.clone(),
            location: job.location.clone(),
            category: job.role_category.clone(),
            hook: None,
            salary_max: job.salary_max,
        }
    }
}

#[derive(Debug)]
pub struct KeywordCache {
    index: HashMap<String, Vec<Arc<TeaserEntry>>>,
    /// Keys containing a space, longest first then alphabetical.
    phrase_keys: Vec<String>,
    job_count: usize,
    built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub keywords: usize,
    pub jobs: usize,
    pub built_at: DateTime<Utc>,
}

impl KeywordCache {
    pub fn empty() -> Self {
        Self::build(&[])
    }

    pub fn build(rows: &[JobTeaserRow]) -> Self {
        let mut index: HashMap<String, Vec<Arc<TeaserEntry>>> = HashMap::new();

        for row in rows {
            let entry = Arc::new(TeaserEntry::from(row));
            let mut keys: Vec<String> = Vec::new();
            for keyword in &row.topic_keywords {
                let phrase = normalize_text(keyword);
                for key in std::iter::once(phrase.as_str()).chain(phrase.split(' ')) {
                    if is_indexable(key) && !keys.iter().any(|k| k == key) {
                        keys.push(key.to_string());
                    }
                }
            }
            for key in keys {
                index.entry(key).or_default().push(entry.clone());
            }
        }

        let mut phrase_keys: Vec<String> =
            index.keys().filter(|k| k.contains(' ')).cloned().collect();
        phrase_keys.sort_by(|a, b| {
            let words = |s: &str| s.split(' ').count();
            words(b).cmp(&words(a)).then_with(|| a.cmp(b))
        });

        Self {
            index,
            phrase_keys,
            job_count: rows.len(),
            built_at: Utc::now(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            keywords: self.index.len(),
            jobs: self.job_count,
            built_at: self.built_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Up to `limit` distinct entries for a free-text query.
    ///
    /// Priority: the whole query as a key, then phrase keys found inside the
    /// query, then individual query words. An empty result means the caller
    /// must fall back to a full search.
    pub fn lookup(&self, query: &str, limit: usize) -> Vec<Arc<TeaserEntry>> {
        let query = normalize_text(query);
        let mut found: Vec<Arc<TeaserEntry>> = Vec::new();
        if query.is_empty() || limit == 0 {
            return found;
        }

        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut take = |entries: &[Arc<TeaserEntry>], found: &mut Vec<Arc<TeaserEntry>>| {
            for entry in entries {
                if found.len() >= limit {
                    return;
                }
                if seen.insert(entry.id) {
                    found.push(entry.clone());
                }
            }
        };

        if let Some(entries) = self.index.get(&query) {
            take(entries, &mut found);
        }

        for key in &self.phrase_keys {
            if found.len() >= limit {
                return found;
            }
            if *key != query && query.contains(key.as_str()) {
                take(&self.index[key], &mut found);
            }
        }

        for token in query.split(' ') {
            if found.len() >= limit {
                break;
            }
            if token.chars().count() <= MIN_TOKEN_CHARS || is_stopword(token) || token == query {
                continue;
            }
            if let Some(entries) = self.index.get(token) {
                take(entries, &mut found);
            }
        }

        found
    }
}

pub async fn load_teaser_rows(pool: &PgPool) -> Result<Vec<JobTeaserRow>, sqlx::Error> {
    sqlx::query_as::<_, JobTeaserRow>(
        r#"
        SELECT id, title, company_name, location, role_category, teaser_hook,
               salary_max, topic_keywords
        FROM jobs
        WHERE is_active = TRUE
        ORDER BY imported_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Process-wide handle to the current cache build.
#[derive(Clone)]
pub struct SharedKeywordCache {
    current: Arc<RwLock<Arc<KeywordCache>>>,
}

impl Default for SharedKeywordCache {
    fn default() -> Self {
        Self::new(KeywordCache::empty())
    }
}

impl SharedKeywordCache {
    pub fn new(cache: KeywordCache) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(cache))),
        }
    }

    /// The current build. Lookups run on the snapshot without holding the lock.
    pub async fn snapshot(&self) -> Arc<KeywordCache> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, cache: KeywordCache) -> CacheStats {
        let stats = cache.stats();
        *self.current.write().await = Arc::new(cache);
        stats
    }

    pub async fn rebuild(&self, pool: &PgPool) -> Result<CacheStats, sqlx::Error> {
        let rows = load_teaser_rows(pool).await?;
        let stats = self.replace(KeywordCache::build(&rows)).await;
        info!(keywords = stats.keywords, jobs = stats.jobs, "Keyword cache rebuilt");
        Ok(stats)
    }

    /// Rebuilds on a fixed interval until `shutdown` fires. A failed rebuild
    /// keeps serving the previous cache.
    pub fn spawn_refresh(
        &self,
        pool: PgPool,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = cache.rebuild(&pool).await {
                            warn!(error = %e, "Keyword cache refresh failed");
                        }
                    }
                }
            }
        })
    }
}
