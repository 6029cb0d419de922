//! Raw-record fetchers: Apify (jobs) and Serper (news).
//!
//! Empty or unusable upstream responses come back as an empty list. Only a
//! transport failure that prevents fetching the batch at all is an error,
//! and that error fails the run.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ingest::types::{RawRecord, RecordKind};

const APIFY_BASE_URL: &str = "https://api.apify.com/v2";
const APIFY_TASK_ID: &str = "definable_field~career-site-job-listing-api-daily";
const SERPER_NEWS_URL: &str = "https://google.serper.dev/news";
const APIFY_RUN_POLL_INTERVAL: Duration = Duration::from_secs(5);
const APIFY_RUN_MAX_WAIT: Duration = Duration::from_secs(10 * 60);

pub const NEWS_QUERIES: &[&str] = &[
    "fractional executive trends",
    "fractional CFO news",
    "fractional CTO hiring",
    "interim executive leadership",
    "part-time C-suite",
    "portfolio career executive",
    "fractional CMO marketing",
    "interim CFO appointment",
];

static RE_SALARY_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d[\d,]*(?:\.\d+)?k?").expect("valid regex"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{source_name}: all requests failed")]
    AllRequestsFailed { source_name: String },
}

#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Source tag stamped on every record this fetcher produces.
    fn source(&self) -> &'static str;

    fn kind(&self) -> RecordKind;

    async fn fetch(&self, max_items: usize) -> Result<Vec<RawRecord>, FetchError>;
}

/// Parses salary text into `(min, max)`. A single figure is both bounds.
///
/// "£800-1200 per day" -> (800, 1200); "£100,000 - £150,000" -> (100000, 150000);
/// "$150k-200k" -> (150000, 200000).
pub fn parse_salary(raw: &str) -> (Option<i32>, Option<i32>) {
    let numbers: Vec<i32> = RE_SALARY_NUMBER
        .find_iter(raw)
        .filter_map(|m| convert_salary_number(m.as_str()))
        .collect();

    match numbers.as_slice() {
        [] => (None, None),
        [only] => (Some(*only), Some(*only)),
        [min, max, ..] => (Some(*min), Some(*max)),
    }
}

fn convert_salary_number(raw: &str) -> Option<i32> {
    let cleaned = raw.replace(',', "");
    let (digits, multiplier) = match cleaned.strip_suffix(['k', 'K']) {
        Some(d) => (d, 1000.0),
        None => (cleaned.as_str(), 1.0),
    };
    let value = digits.parse::<f64>().ok()? * multiplier;
    if value.is_finite() && value >= 0.0 && value <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Apify
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApifyRunsResponse {
    data: ApifyRunsData,
}

#[derive(Debug, Deserialize)]
struct ApifyRunsData {
    #[serde(default)]
    items: Vec<ApifyRun>,
}

#[derive(Debug, Deserialize)]
struct ApifyRunResponse {
    data: ApifyRun,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApifyRun {
    #[serde(default)]
    id: String,
    status: String,
    default_dataset_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Succeeded,
    Failed,
}

impl RunState {
    fn from_status(status: &str) -> Self {
        match status {
            "SUCCEEDED" => RunState::Succeeded,
            "FAILED" | "ABORTED" | "TIMED-OUT" => RunState::Failed,
            _ => RunState::Running,
        }
    }
}

/// Reads the dataset of an Apify scraping task. By default that is the
/// latest scheduled run; with a fresh run the task is triggered first and
/// its own dataset is read once it finishes.
pub struct ApifyFetcher {
    client: reqwest::Client,
    token: String,
    fresh_run: bool,
    max_wait: Duration,
}

impl ApifyFetcher {
    pub fn new(token: String) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            token,
            fresh_run: false,
            max_wait: APIFY_RUN_MAX_WAIT,
        })
    }

    pub fn with_fresh_run(mut self, fresh_run: bool) -> Self {
        self.fresh_run = fresh_run;
        self
    }

    /// Starts a new run of the task. `None` when Apify refuses.
    async fn trigger_run(&self) -> Result<Option<ApifyRun>, FetchError> {
        let response = self
            .client
            .post(format!("{APIFY_BASE_URL}/actor-tasks/{APIFY_TASK_ID}/runs"))
            .query(&[("token", self.token.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "Apify task trigger failed");
            return Ok(None);
        }

        match response.json::<ApifyRunResponse>().await {
            Ok(body) => {
                info!(run_id = %body.data.id, "Apify task triggered");
                Ok(Some(body.data))
            }
            Err(e) => {
                warn!(error = %e, "Unreadable Apify trigger response");
                Ok(None)
            }
        }
    }

    /// Polls a run until it reaches a terminal status. Returns its dataset
    /// on success; `None` on failure, on an unreadable status or after
    /// `max_wait`.
    async fn wait_for_run(&self, run: ApifyRun) -> Result<Option<String>, FetchError> {
        let deadline = tokio::time::Instant::now() + self.max_wait;
        let mut status = run.status;
        let mut polls: u32 = 0;

        loop {
            match RunState::from_status(&status) {
                RunState::Succeeded => {
                    info!(run_id = %run.id, "Apify run succeeded");
                    return Ok(Some(run.default_dataset_id));
                }
                RunState::Failed => {
                    warn!(run_id = %run.id, %status, "Apify run did not succeed");
                    return Ok(None);
                }
                RunState::Running => {}
            }

            if tokio::time::Instant::now() + APIFY_RUN_POLL_INTERVAL > deadline {
                warn!(
                    run_id = %run.id,
                    max_wait_secs = self.max_wait.as_secs(),
                    "Timed out waiting for Apify run"
                );
                return Ok(None);
            }
            if polls % 6 == 0 {
                debug!(run_id = %run.id, %status, "Waiting for Apify run");
            }
            polls += 1;
            tokio::time::sleep(APIFY_RUN_POLL_INTERVAL).await;

            let response = self
                .client
                .get(format!("{APIFY_BASE_URL}/actor-runs/{}", run.id))
                .query(&[("token", self.token.as_str())])
                .send()
                .await?;
            if !response.status().is_success() {
                warn!(status = response.status().as_u16(), "Apify run status request failed");
                return Ok(None);
            }
            status = match response.json::<ApifyRunResponse>().await {
                Ok(body) => body.data.status,
                Err(e) => {
                    warn!(error = %e, "Unreadable Apify run status");
                    return Ok(None);
                }
            };
        }
    }

    async fn fresh_dataset_id(&self) -> Result<Option<String>, FetchError> {
        match self.trigger_run().await? {
            Some(run) => self.wait_for_run(run).await,
            None => Ok(None),
        }
    }

    async fn list_runs(
        &self,
        limit: &str,
        succeeded_only: bool,
    ) -> Result<Vec<ApifyRun>, FetchError> {
        let mut query = vec![("token", self.token.as_str()), ("limit", limit), ("desc", "true")];
        if succeeded_only {
            query.push(("status", "SUCCEEDED"));
        }

        let response = self
            .client
            .get(format!("{APIFY_BASE_URL}/actor-tasks/{APIFY_TASK_ID}/runs"))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "Apify runs request failed");
            return Ok(Vec::new());
        }

        match response.json::<ApifyRunsResponse>().await {
            Ok(body) => Ok(body.data.items),
            Err(e) => {
                warn!(error = %e, "Unreadable Apify runs response");
                Ok(Vec::new())
            }
        }
    }

    /// Dataset of the latest run, or of the last successful run when the
    /// latest one did not succeed.
    async fn latest_dataset_id(&self) -> Result<Option<String>, FetchError> {
        let runs = self.list_runs("1", false).await?;
        let Some(latest) = runs.into_iter().next() else {
            warn!("No Apify runs found for task");
            return Ok(None);
        };

        if latest.status == "SUCCEEDED" {
            return Ok(Some(latest.default_dataset_id));
        }

        warn!(status = %latest.status, "Latest Apify run not successful, looking for last success");
        let succeeded = self.list_runs("10", true).await?;
        Ok(succeeded.into_iter().next().map(|r| r.default_dataset_id))
    }
}

#[async_trait]
impl RecordFetcher for ApifyFetcher {
    fn source(&self) -> &'static str {
        "apify_career_site"
    }

    fn kind(&self) -> RecordKind {
        RecordKind::Job
    }

    async fn fetch(&self, max_items: usize) -> Result<Vec<RawRecord>, FetchError> {
        let dataset_id = if self.fresh_run {
            self.fresh_dataset_id().await?
        } else {
            self.latest_dataset_id().await?
        };
        let Some(dataset_id) = dataset_id else {
            return Ok(Vec::new());
        };

        let limit = max_items.to_string();
        let response = self
            .client
            .get(format!("{APIFY_BASE_URL}/datasets/{dataset_id}/items"))
            .query(&[
                ("token", self.token.as_str()),
                ("format", "json"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), %dataset_id, "Apify dataset request failed");
            return Ok(Vec::new());
        }

        let items: Vec<Value> = match response.json().await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Unreadable Apify dataset");
                return Ok(Vec::new());
            }
        };

        let total = items.len();
        let records: Vec<RawRecord> = items
            .iter()
            .filter_map(|item| map_apify_item(item, self.source()))
            .take(max_items)
            .collect();

        info!(total, parsed = records.len(), "Fetched Apify jobs");
        Ok(records)
    }
}

fn first_str(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Maps one dataset item, tolerating the field names different career-site
/// scrapers use. Items without a title or URL are dropped.
pub fn map_apify_item(item: &Value, source: &str) -> Option<RawRecord> {
    let title = first_str(item, &["title", "positionName", "jobTitle"]);
    let url = first_str(item, &["url", "applyUrl", "jobUrl"]);
    let (Some(title), Some(url)) = (title, url) else {
        debug!(title = ?item.get("title"), "Skipping Apify item missing title or url");
        return None;
    };

    let (salary_min, salary_max) = first_str(item, &["salary", "salaryRange"])
        .map(|s| parse_salary(&s))
        .unwrap_or((None, None));

    let external_id = first_str(item, &["id", "jobId"]).unwrap_or_else(|| url.clone());

    Some(RawRecord {
        kind: RecordKind::Job,
        title,
        organization: first_str(item, &["company", "companyName", "employer"])
            .unwrap_or_else(|| "Unknown".to_string()),
        location: Some(
            first_str(item, &["location", "jobLocation"]).unwrap_or_else(|| "UK".to_string()),
        ),
        description: first_str(item, &["description", "jobDescription"]).unwrap_or_default(),
        url,
        salary_min,
        salary_max,
        source: source.to_string(),
        external_id,
        published_date: first_str(item, &["datePosted", "postedAt"]),
        image_url: None,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Serper
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    news: Vec<SerperNewsItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerperNewsItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

/// Google News search via Serper over a fixed set of queries.
pub struct SerperFetcher {
    client: reqwest::Client,
    api_key: String,
    queries: Vec<String>,
    /// Serper time filter: d, w or m.
    time_period: &'static str,
}

impl SerperFetcher {
    pub fn new(api_key: String) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key,
            queries: NEWS_QUERIES.iter().map(|q| q.to_string()).collect(),
            time_period: "d",
        })
    }

    async fn search(&self, query: &str, num: usize) -> Result<Vec<SerperNewsItem>, reqwest::Error> {
        let response = self
            .client
            .post(SERPER_NEWS_URL)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({
                "q": query,
                "gl": "gb",
                "hl": "en",
                "num": num,
                "tbs": format!("qdr:{}", self.time_period),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), query, "Serper search failed");
            return Ok(Vec::new());
        }

        Ok(response.json::<SerperResponse>().await?.news)
    }
}

#[async_trait]
impl RecordFetcher for SerperFetcher {
    fn source(&self) -> &'static str {
        "serper_news"
    }

    fn kind(&self) -> RecordKind {
        RecordKind::News
    }

    async fn fetch(&self, max_items: usize) -> Result<Vec<RawRecord>, FetchError> {
        let per_query = (max_items / self.queries.len().max(1)).clamp(1, 100);
        let mut batches = Vec::with_capacity(self.queries.len());
        let mut failures = 0;

        for query in &self.queries {
            match self.search(query, per_query).await {
                Ok(items) => {
                    debug!(query = %query, count = items.len(), "Serper results");
                    batches.push(items);
                }
                Err(e) => {
                    failures += 1;
                    warn!(query = %query, error = %e, "Serper request failed");
                }
            }
        }

        if failures > 0 && failures == self.queries.len() {
            return Err(FetchError::AllRequestsFailed {
                source_name: self.source().to_string(),
            });
        }

        let records = merge_news(batches, self.source(), max_items);
        info!(count = records.len(), "Fetched Serper news");
        Ok(records)
    }
}

/// Flattens per-query results, keeping the first occurrence of each URL.
fn merge_news(batches: Vec<Vec<SerperNewsItem>>, source: &str, max_items: usize) -> Vec<RawRecord> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|item| !item.title.trim().is_empty() && !item.link.trim().is_empty())
        .filter(|item| seen.insert(item.link.clone()))
        .take(max_items)
        .map(|item| RawRecord {
            kind: RecordKind::News,
            title: item.title.trim().to_string(),
            organization: item.source.unwrap_or_else(|| "Unknown".to_string()),
            location: None,
            description: item.snippet,
            external_id: item.link.clone(),
            url: item.link,
            salary_min: None,
            salary_max: None,
            source: source.to_string(),
            published_date: item.date,
            image_url: item.image_url,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_salary_formats() {
        assert_eq!(parse_salary("£800-1200 per day"), (Some(800), Some(1200)));
        assert_eq!(
            parse_salary("£100,000 - £150,000 per year"),
            (Some(100_000), Some(150_000))
        );
        assert_eq!(parse_salary("$150k-200k"), (Some(150_000), Some(200_000)));
        assert_eq!(parse_salary("£950 per day"), (Some(950), Some(950)));
        assert_eq!(parse_salary("Competitive"), (None, None));
    }

    #[test]
    fn test_run_states() {
        assert_eq!(RunState::from_status("SUCCEEDED"), RunState::Succeeded);
        for failed in ["FAILED", "ABORTED", "TIMED-OUT"] {
            assert_eq!(RunState::from_status(failed), RunState::Failed, "{failed}");
        }
        for running in ["READY", "RUNNING", "TIMING-OUT", "ABORTING"] {
            assert_eq!(RunState::from_status(running), RunState::Running, "{running}");
        }
    }

    #[test]
    fn test_trigger_response_carries_run_and_dataset() {
        let body: ApifyRunResponse = serde_json::from_value(json!({
            "data": {
                "id": "HG7ML7M8z78YcAPEB",
                "actId": "HDSasDasz78YcAPEB",
                "status": "READY",
                "defaultDatasetId": "wmKPijuyDnPZAPRMk"
            }
        }))
        .unwrap();
        assert_eq!(body.data.id, "HG7ML7M8z78YcAPEB");
        assert_eq!(RunState::from_status(&body.data.status), RunState::Running);
        assert_eq!(body.data.default_dataset_id, "wmKPijuyDnPZAPRMk");
    }

    fn run(status: &str) -> ApifyRun {
        ApifyRun {
            id: "run-1".to_string(),
            status: status.to_string(),
            default_dataset_id: "dataset-1".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_run_needs_no_polling() {
        let fetcher = ApifyFetcher::new("token".to_string()).unwrap();
        assert_eq!(
            fetcher.wait_for_run(run("SUCCEEDED")).await.unwrap().as_deref(),
            Some("dataset-1")
        );
        assert_eq!(fetcher.wait_for_run(run("ABORTED")).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_run_gives_up_after_max_wait() {
        let mut fetcher = ApifyFetcher::new("token".to_string()).unwrap();
        fetcher.max_wait = Duration::from_secs(1);
        assert_eq!(fetcher.wait_for_run(run("RUNNING")).await.unwrap(), None);
    }

    #[test]
    fn test_map_apify_item_field_fallbacks() {
        let item = json!({
            "positionName": "Fractional CFO",
            "companyName": "Acme",
            "applyUrl": "https://acme.example/jobs/1",
            "salaryRange": "£90k-110k",
            "jobId": 42
        });
        let record = map_apify_item(&item, "apify_career_site").unwrap();
        assert_eq!(record.title, "Fractional CFO");
        assert_eq!(record.organization, "Acme");
        assert_eq!(record.location.as_deref(), Some("UK"));
        assert_eq!(record.external_id, "42");
        assert_eq!((record.salary_min, record.salary_max), (Some(90_000), Some(110_000)));
    }

    #[test]
    fn test_map_apify_item_requires_title_and_url() {
        assert!(map_apify_item(&json!({"title": "CTO"}), "x").is_none());
        assert!(map_apify_item(&json!({"url": "https://x"}), "x").is_none());
        let record = map_apify_item(&json!({"title": "CTO", "url": "https://x"}), "x").unwrap();
        assert_eq!(record.external_id, "https://x");
        assert_eq!(record.organization, "Unknown");
    }

    #[test]
    fn test_merge_news_dedupes_by_url() {
        let item = |title: &str, link: &str| SerperNewsItem {
            title: title.to_string(),
            snippet: "s".to_string(),
            link: link.to_string(),
            source: Some("FT".to_string()),
            date: None,
            image_url: None,
        };
        let batches = vec![
            vec![item("A", "https://a"), item("B", "https://b")],
            vec![item("A again", "https://a"), item("", "https://c"), item("D", "https://d")],
        ];
        let records = merge_news(batches, "serper_news", 10);
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "D"]);
        assert_eq!(records[0].external_id, "https://a");
        assert_eq!(records[0].kind, RecordKind::News);
    }

    #[test]
    fn test_merge_news_respects_limit() {
        let batch: Vec<SerperNewsItem> = (0..5)
            .map(|i| SerperNewsItem {
                title: format!("T{i}"),
                snippet: String::new(),
                link: format!("https://n/{i}"),
                source: None,
                date: None,
                image_url: None,
            })
            .collect();
        assert_eq!(merge_news(vec![batch], "serper_news", 3).len(), 3);
    }
}
