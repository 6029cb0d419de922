//! In-crate fakes for the two-stage lookup tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::JobSummary;
use crate::tscr::search::FullSearch;

pub(crate) fn summary(id: u128, title: &str) -> JobSummary {
    JobSummary {
        id: Uuid::from_u128(id),
        slug: title.to_lowercase().replace(' ', "-"),
        title: title.to_string(),
        company_name: "Acme".to_string(),
        location: Some("London".to_string()),
        role_category: "CTO".to_string(),
        description_snippet: format!("{title} opening"),
        url: format!("https://careers.example/{id}"),
        salary_min: None,
        salary_max: Some(150_000),
    }
}

/// Returns a fixed result set after an optional delay.
#[derive(Default)]
pub(crate) struct FakeSearch {
    jobs: Vec<JobSummary>,
    delay: Option<Duration>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeSearch {
    pub(crate) fn returning(jobs: Vec<JobSummary>) -> Self {
        Self {
            jobs,
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FullSearch for FakeSearch {
    async fn search(&self, _query: &str, limit: i64) -> Result<Vec<JobSummary>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::Internal(anyhow::anyhow!("search backend down")));
        }
        Ok(self.jobs.iter().take(limit as usize).cloned().collect())
    }
}
