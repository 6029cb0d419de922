//! Two-stage retrieval: speak a cached teaser now, load the full results in
//! the background, hand them over when the user asks for more.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::job::JobSummary;
use crate::tscr::keyword_cache::{SharedKeywordCache, TeaserEntry, DEFAULT_MATCH_LIMIT};
use crate::tscr::pending::{FullResults, PendingResults};
use crate::tscr::search::{FullSearch, FULL_RESULTS_LIMIT};
use crate::tscr::session::SessionStore;
use crate::tscr::teaser::compose_teaser;

pub const DEFAULT_BACKGROUND_TIMEOUT: Duration = Duration::from_secs(10);

const NO_RESULTS_MESSAGE: &str = "I couldn't find any roles matching that right now.";
const NO_CONTEXT_MESSAGE: &str = "Tell me what kind of role you're after and I'll take a look.";

const AFFIRMATIONS: &[&str] = &[
    "yes", "yeah", "yep", "yup", "sure", "ok", "okay", "please", "please do", "go on",
    "go ahead", "tell me more", "more", "more details", "more info", "sounds good",
    "absolutely", "definitely", "of course", "why not", "let's hear it", "i'd like that",
];
const NEGATIONS: &[&str] = &["no", "nope", "nah", "don't", "dont"];
const MAX_AFFIRMATION_WORDS: usize = 6;

/// True for short replies that accept an offer to hear more.
pub fn is_affirmation(utterance: &str) -> bool {
    let text = utterance
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect::<String>();
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || words.len() > MAX_AFFIRMATION_WORDS {
        return false;
    }
    if words.iter().any(|w| NEGATIONS.contains(w)) {
        return false;
    }
    let text = words.join(" ");
    AFFIRMATIONS
        .iter()
        .any(|a| text == *a || text.starts_with(&format!("{a} ")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Cache,
    Pending,
    FullSearch,
    NoResults,
    NoContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeaserReply {
    pub message: String,
    pub source: ReplySource,
    pub teasers: Vec<TeaserEntry>,
    /// Populated only when the cache missed and the full search ran inline.
    pub jobs: Vec<JobSummary>,
    pub more_available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoreReply {
    pub message: String,
    pub source: ReplySource,
    pub jobs: Vec<JobSummary>,
}

pub struct FastPath {
    cache: SharedKeywordCache,
    pending: Arc<dyn PendingResults>,
    search: Arc<dyn FullSearch>,
    sessions: Arc<SessionStore>,
    background_timeout: Duration,
}

impl FastPath {
    pub fn new(
        cache: SharedKeywordCache,
        pending: Arc<dyn PendingResults>,
        search: Arc<dyn FullSearch>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            cache,
            pending,
            search,
            sessions,
            background_timeout: DEFAULT_BACKGROUND_TIMEOUT,
        }
    }

    pub fn with_background_timeout(mut self, timeout: Duration) -> Self {
        self.background_timeout = timeout;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn search(&self) -> &dyn FullSearch {
        self.search.as_ref()
    }

    pub async fn quick_teaser(
        &self,
        session_id: &str,
        query: &str,
    ) -> Result<TeaserReply, AppError> {
        let (reply, _) = self.respond(session_id, query).await?;
        Ok(reply)
    }

    /// Like `quick_teaser`, also returning the background load if one started.
    pub(crate) async fn respond(
        &self,
        session_id: &str,
        query: &str,
    ) -> Result<(TeaserReply, Option<JoinHandle<()>>), AppError> {
        let teasers = self.cache.snapshot().await.lookup(query, DEFAULT_MATCH_LIMIT);

        if let Some(best) = teasers.first() {
            info!(session_id, query, matches = teasers.len(), "Keyword cache hit");
            let best_id = best.id;
            self.sessions
                .update(session_id, |ctx| {
                    ctx.last_query = Some(query.to_string());
                    ctx.last_job_id = Some(best_id);
                })
                .await;

            let token = self.sessions.begin_load(session_id).await;
            let handle = self.spawn_load(session_id.to_string(), query.to_string(), token);

            let reply = TeaserReply {
                message: format!(
                    "{} Want to hear more?",
                    compose_teaser(best, teasers.len() - 1)
                ),
                source: ReplySource::Cache,
                teasers: teasers.iter().map(|t| t.as_ref().clone()).collect(),
                jobs: Vec::new(),
                more_available: true,
            };
            return Ok((reply, Some(handle)));
        }

        info!(session_id, query, "Keyword cache miss, running full search");
        self.sessions.cancel_load(session_id).await;
        if let Err(e) = self.pending.discard(session_id).await {
            warn!(session_id, error = %e, "Failed to discard stale pending results");
        }

        let jobs = self.search.search(query, FULL_RESULTS_LIMIT).await?;
        let first_id = jobs.first().map(|j| j.id);
        self.sessions
            .update(session_id, |ctx| {
                ctx.last_query = Some(query.to_string());
                ctx.last_job_id = first_id;
            })
            .await;

        let (message, source) = match jobs.first() {
            Some(first) => (
                compose_teaser(&TeaserEntry::from(first), jobs.len() - 1),
                ReplySource::FullSearch,
            ),
            None => (NO_RESULTS_MESSAGE.to_string(), ReplySource::NoResults),
        };
        let reply = TeaserReply {
            message,
            source,
            teasers: Vec::new(),
            jobs,
            more_available: false,
        };
        Ok((reply, None))
    }

    /// Full results for the session's last query: the background load if it
    /// finished, otherwise an inline search.
    pub async fn tell_me_more(&self, session_id: &str) -> Result<MoreReply, AppError> {
        let Some(query) = self.sessions.context(session_id).await.last_query else {
            return Ok(MoreReply {
                message: NO_CONTEXT_MESSAGE.to_string(),
                source: ReplySource::NoContext,
                jobs: Vec::new(),
            });
        };

        let pending = match self.pending.take(session_id).await {
            Ok(found) => found.filter(|r| r.query == query),
            Err(e) => {
                warn!(session_id, error = %e, "Pending results unavailable");
                None
            }
        };

        let (jobs, source) = match pending {
            Some(results) => {
                debug!(session_id, jobs = results.jobs.len(), "Serving pending results");
                (results.jobs, ReplySource::Pending)
            }
            None => {
                self.sessions.cancel_load(session_id).await;
                let jobs = self.search.search(&query, FULL_RESULTS_LIMIT).await?;
                (jobs, ReplySource::FullSearch)
            }
        };

        if let Some(first) = jobs.first() {
            let first_id = first.id;
            self.sessions
                .update(session_id, |ctx| ctx.last_job_id = Some(first_id))
                .await;
        }

        Ok(MoreReply {
            message: describe_results(&query, &jobs),
            source: if jobs.is_empty() { ReplySource::NoResults } else { source },
            jobs,
        })
    }

    /// Treats an affirmative reply as a request for more; anything else is
    /// left to the caller.
    pub async fn follow_up(
        &self,
        session_id: &str,
        utterance: &str,
    ) -> Result<Option<MoreReply>, AppError> {
        if !is_affirmation(utterance) {
            return Ok(None);
        }
        self.tell_me_more(session_id).await.map(Some)
    }

    /// Cancels the session's background work and drops its pending results.
    pub async fn end_session(&self, session_id: &str) -> bool {
        let existed = self.sessions.end(session_id).await;
        if let Err(e) = self.pending.discard(session_id).await {
            warn!(session_id, error = %e, "Failed to discard pending results");
        }
        existed
    }

    fn spawn_load(&self, key: String, query: String, token: CancellationToken) -> JoinHandle<()> {
        let search = Arc::clone(&self.search);
        let pending = Arc::clone(&self.pending);
        let timeout = self.background_timeout;

        tokio::spawn(async move {
            let load = tokio::time::timeout(timeout, search.search(&query, FULL_RESULTS_LIMIT));
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(session_id = %key, "Background load cancelled");
                }
                outcome = load => match outcome {
                    Ok(Ok(jobs)) => {
                        let count = jobs.len();
                        let results = FullResults::new(query.clone(), jobs);
                        match pending.put(&key, results).await {
                            Ok(()) => {
                                debug!(session_id = %key, jobs = count, "Background load stored")
                            }
                            Err(e) => warn!(
                                session_id = %key,
                                error = %e,
                                "Failed to store background results"
                            ),
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(session_id = %key, error = %e, "Background full search failed")
                    }
                    Err(_) => warn!(
                        session_id = %key,
                        timeout_secs = timeout.as_secs(),
                        "Background full search timed out"
                    ),
                }
            }
        })
    }
}

fn describe_results(query: &str, jobs: &[JobSummary]) -> String {
    match jobs {
        [] => NO_RESULTS_MESSAGE.to_string(),
        [only] => format!(
            "I found 1 role for \"{query}\": {} at {}.",
            only.title, only.company_name
        ),
        [first, rest @ ..] => format!(
            "I found {} roles for \"{query}\". The first is {} at {}.",
            rest.len() + 1,
            first.title,
            first.company_name
        ),
    }
}
