//! Per-conversation state.
//!
//! Each session owns a cancellation token; background loads run on a child
//! token so ending the session (or starting a newer lookup) stops them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionContext {
    /// Job most recently described to the user.
    pub last_job_id: Option<Uuid>,
    pub last_query: Option<String>,
    /// Page the user is viewing, as reported by the client.
    pub page_context: Option<String>,
}

struct Session {
    context: SessionContext,
    cancel: CancellationToken,
    inflight: Option<CancellationToken>,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            context: SessionContext::default(),
            cancel: CancellationToken::new(),
            inflight: None,
            last_seen: Instant::now(),
        }
    }

    fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a session's context; unknown sessions read as empty.
    pub async fn context(&self, session_id: &str) -> SessionContext {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.context.clone())
            .unwrap_or_default()
    }

    /// Applies `f` to the session's context, creating the session if needed.
    pub async fn update<F>(&self, session_id: &str, f: F)
    where
        F: FnOnce(&mut SessionContext),
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(Session::new);
        session.last_seen = Instant::now();
        f(&mut session.context);
    }

    /// Token for a new background load. Any earlier load still running for
    /// this session is cancelled.
    pub async fn begin_load(&self, session_id: &str) -> CancellationToken {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(Session::new);
        session.last_seen = Instant::now();
        if let Some(previous) = session.inflight.take() {
            previous.cancel();
        }
        let token = session.cancel.child_token();
        session.inflight = Some(token.clone());
        token
    }

    pub async fn cancel_load(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            if let Some(inflight) = session.inflight.take() {
                inflight.cancel();
            }
        }
    }

    /// Cancels the session's work and forgets it. Returns false for an
    /// unknown session.
    pub async fn end(&self, session_id: &str) -> bool {
        match self.sessions.write().await.remove(session_id) {
            Some(session) => {
                session.shutdown();
                true
            }
            None => false,
        }
    }

    /// Ends sessions idle for longer than `max_idle`.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            let keep = now.duration_since(session.last_seen) <= max_idle;
            if !keep {
                session.shutdown();
            }
            keep
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Periodically ends idle sessions until `shutdown` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        max_idle: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let ended = self.prune_idle(max_idle).await;
                        if ended > 0 {
                            tracing::info!(ended, "Ended idle sessions");
                        }
                    }
                }
            }
        })
    }
}
