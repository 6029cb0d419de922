//! In-memory store and fake collaborators for pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::ingest::classifier::RelevanceClassifier;
use crate::ingest::enricher::ContentEnricher;
use crate::ingest::fetchers::{FetchError, RecordFetcher};
use crate::ingest::fingerprint::content_hash;
use crate::ingest::images::ImageSearch;
use crate::ingest::pipeline::RunStatus;
use crate::ingest::recruiter::RecruiterPattern;
use crate::ingest::scraper::{PageScraper, ScrapedPage};
use crate::ingest::store::{ImportStore, RunOutcome, StoreError};
use crate::ingest::text::generate_slug;
use crate::ingest::types::{
    Category, ClassificationResult, EnrichedRecord, Enrichment, ImageAttribution,
    LongFormContent, RawRecord, RecordKind,
};
use crate::llm_client::LlmError;
use crate::normalize::{NewsCategory, RoleCategory};

// ────────────────────────────────────────────────────────────────────────────
// Record builders
// ────────────────────────────────────────────────────────────────────────────

pub fn job(title: &str, organization: &str, location: Option<&str>) -> RawRecord {
    let slug = generate_slug(title, organization);
    RawRecord {
        kind: RecordKind::Job,
        title: title.to_string(),
        organization: organization.to_string(),
        location: location.map(str::to_string),
        description: format!("{title} at {organization}. Two days a week, board-facing."),
        url: format!("https://careers.example/{slug}"),
        salary_min: None,
        salary_max: None,
        source: "apify_career_site".to_string(),
        external_id: format!("ext-{slug}"),
        published_date: None,
        image_url: None,
    }
}

pub fn news(title: &str, source_name: &str) -> RawRecord {
    let slug = generate_slug(title, source_name);
    RawRecord {
        kind: RecordKind::News,
        title: title.to_string(),
        organization: source_name.to_string(),
        location: None,
        description: format!("{title}. Analysis of the fractional executive market."),
        url: format!("https://news.example/{slug}"),
        salary_min: None,
        salary_max: None,
        source: "serper_news".to_string(),
        external_id: format!("https://news.example/{slug}"),
        published_date: None,
        image_url: None,
    }
}

/// A persisted-looking record for seeding a store.
pub fn enriched(raw: &RawRecord) -> EnrichedRecord {
    EnrichedRecord {
        raw: raw.clone(),
        slug: generate_slug(&raw.title, &raw.organization),
        content_hash: content_hash(raw),
        category: Category::other_for(raw.kind),
        enrichment: Enrichment {
            snippet: raw.title.clone(),
            teaser: String::new(),
            keywords: vec![],
            key_insights: vec![],
            sentiment: None,
        },
        long_form: None,
        image: None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MemoryStore
// ────────────────────────────────────────────────────────────────────────────

struct RunRecord {
    id: Uuid,
    pipeline: String,
    status: RunStatus,
    error: Option<String>,
}

#[derive(Default)]
struct StoreState {
    records: Vec<EnrichedRecord>,
    inserted: Vec<EnrichedRecord>,
    patterns: Vec<RecruiterPattern>,
    blocks: HashMap<Uuid, usize>,
    runs: Vec<RunRecord>,
    dedup_queries: Vec<&'static str>,
    fail_lookups: bool,
    fail_blocks: bool,
    fail_insert_titles: Vec<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    pub fn seed(&self, record: EnrichedRecord) {
        self.state().records.push(record);
    }

    pub fn add_pattern(&self, pattern: RecruiterPattern) {
        self.state().patterns.push(pattern);
    }

    pub fn fail_lookups(&self) {
        self.state().fail_lookups = true;
    }

    pub fn fail_block_increments(&self) {
        self.state().fail_blocks = true;
    }

    pub fn fail_insert_for(&self, title: &str) {
        self.state().fail_insert_titles.push(title.to_string());
    }

    /// Leaves a `running` row behind, as a concurrent run would.
    pub fn hold_running(&self, pipeline: &str) {
        self.state().runs.push(RunRecord {
            id: Uuid::new_v4(),
            pipeline: pipeline.to_string(),
            status: RunStatus::Running,
            error: None,
        });
    }

    pub fn dedup_queries(&self) -> Vec<&'static str> {
        self.state().dedup_queries.clone()
    }

    pub fn block_count(&self, pattern_id: Uuid) -> usize {
        self.state().blocks.get(&pattern_id).copied().unwrap_or(0)
    }

    pub fn inserted(&self) -> Vec<EnrichedRecord> {
        self.state().inserted.clone()
    }

    pub fn inserted_titles(&self) -> Vec<String> {
        self.state()
            .inserted
            .iter()
            .map(|r| r.raw.title.clone())
            .collect()
    }

    pub fn run_status(&self, run_id: Uuid) -> Option<RunStatus> {
        self.state()
            .runs
            .iter()
            .find(|r| r.id == run_id)
            .map(|r| r.status)
    }

    pub fn last_run(&self) -> Option<(RunStatus, Option<String>)> {
        self.state()
            .runs
            .last()
            .map(|r| (r.status, r.error.clone()))
    }

    fn lookup(
        &self,
        query: &'static str,
        matches: impl Fn(&EnrichedRecord) -> bool,
    ) -> Result<bool, StoreError> {
        let mut state = self.state();
        state.dedup_queries.push(query);
        if state.fail_lookups {
            return Err(StoreError::Unavailable("lookup failed".to_string()));
        }
        Ok(state.records.iter().any(matches))
    }
}

#[async_trait]
impl ImportStore for MemoryStore {
    async fn exists_by_external_id(
        &self,
        kind: RecordKind,
        source: &str,
        external_id: &str,
    ) -> Result<bool, StoreError> {
        self.lookup("external_id", |r| {
            r.raw.kind == kind && r.raw.source == source && r.raw.external_id == external_id
        })
    }

    async fn exists_by_content_hash(
        &self,
        kind: RecordKind,
        hash: &str,
    ) -> Result<bool, StoreError> {
        self.lookup("content_hash", |r| r.raw.kind == kind && r.content_hash == hash)
    }

    async fn exists_by_url(&self, kind: RecordKind, url: &str) -> Result<bool, StoreError> {
        self.lookup("url", |r| r.raw.kind == kind && r.raw.url == url)
    }

    async fn insert_record(&self, record: &EnrichedRecord) -> Result<Uuid, StoreError> {
        let mut state = self.state();
        if state.fail_insert_titles.contains(&record.raw.title) {
            return Err(StoreError::Unavailable("insert failed".to_string()));
        }
        state.records.push(record.clone());
        state.inserted.push(record.clone());
        Ok(Uuid::new_v4())
    }

    async fn load_recruiter_patterns(&self) -> Result<Vec<RecruiterPattern>, StoreError> {
        Ok(self.state().patterns.clone())
    }

    async fn increment_recruiter_block(&self, pattern_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_blocks {
            return Err(StoreError::Unavailable("increment failed".to_string()));
        }
        *state.blocks.entry(pattern_id).or_default() += 1;
        Ok(())
    }

    async fn start_run(
        &self,
        pipeline: &str,
        _lease: Duration,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut state = self.state();
        if state
            .runs
            .iter()
            .any(|r| r.pipeline == pipeline && r.status == RunStatus::Running)
        {
            return Ok(None);
        }
        let id = Uuid::new_v4();
        state.runs.push(RunRecord {
            id,
            pipeline: pipeline.to_string(),
            status: RunStatus::Running,
            error: None,
        });
        Ok(Some(id))
    }

    async fn complete_run(&self, run_id: Uuid, outcome: RunOutcome<'_>) -> Result<(), StoreError> {
        let mut state = self.state();
        if let Some(run) = state
            .runs
            .iter_mut()
            .find(|r| r.id == run_id && r.status == RunStatus::Running)
        {
            run.status = outcome.status;
            run.error = outcome.error.map(str::to_string);
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fake collaborators
// ────────────────────────────────────────────────────────────────────────────

enum ClassifierMode {
    Accept(Category, f64),
    Reject,
    Fail,
}

pub struct FakeClassifier {
    mode: ClassifierMode,
    score_overrides: HashMap<String, f64>,
    calls: Arc<AtomicUsize>,
}

impl FakeClassifier {
    fn with_mode(mode: ClassifierMode) -> Self {
        Self {
            mode,
            score_overrides: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn accepting(role: RoleCategory, score: f64) -> Self {
        Self::with_mode(ClassifierMode::Accept(Category::Role(role), score))
    }

    pub fn accepting_news(score: f64) -> Self {
        Self::with_mode(ClassifierMode::Accept(
            Category::News(NewsCategory::Trends),
            score,
        ))
    }

    pub fn rejecting() -> Self {
        Self::with_mode(ClassifierMode::Reject)
    }

    pub fn failing() -> Self {
        Self::with_mode(ClassifierMode::Fail)
    }

    /// Overrides the score for one title.
    pub fn with_score(mut self, title: &str, score: f64) -> Self {
        self.score_overrides.insert(title.to_string(), score);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl RelevanceClassifier for FakeClassifier {
    async fn classify(&self, record: &RawRecord) -> Result<ClassificationResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            ClassifierMode::Accept(category, score) => Ok(ClassificationResult {
                is_relevant: true,
                category: Some(*category),
                score: self
                    .score_overrides
                    .get(&record.title)
                    .copied()
                    .unwrap_or(*score),
                rationale: "fractional executive role".to_string(),
            }),
            ClassifierMode::Reject => Ok(ClassificationResult {
                is_relevant: false,
                category: None,
                score: 0.9,
                rationale: "not an executive role".to_string(),
            }),
            ClassifierMode::Fail => Err(LlmError::EmptyContent),
        }
    }
}

#[derive(Default)]
pub struct FakeEnricher {
    fail: bool,
    panic_on: Option<String>,
    snippet: Option<String>,
}

impl FakeEnricher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn panicking_on(mut self, title: &str) -> Self {
        self.panic_on = Some(title.to_string());
        self
    }

    pub fn with_snippet(mut self, snippet: &str) -> Self {
        self.snippet = Some(snippet.to_string());
        self
    }
}

#[async_trait]
impl ContentEnricher for FakeEnricher {
    async fn enrich(
        &self,
        record: &RawRecord,
        category: Category,
    ) -> Result<Enrichment, LlmError> {
        if self.panic_on.as_deref() == Some(record.title.as_str()) {
            panic!("enrichment blew up for {}", record.title);
        }
        if self.fail {
            return Err(LlmError::EmptyContent);
        }
        Ok(Enrichment {
            snippet: self
                .snippet
                .clone()
                .unwrap_or_else(|| format!("{} role at {}", category.label(), record.organization)),
            teaser: format!("A {} role at {}", category.label(), record.organization),
            keywords: vec![category.label().to_lowercase(), "fractional".to_string()],
            key_insights: vec![],
            sentiment: None,
        })
    }

    async fn generate_full_content(
        &self,
        _record: &RawRecord,
        _category: Category,
        page_text: Option<&str>,
    ) -> Result<LongFormContent, LlmError> {
        let description = match page_text {
            Some(_) => "Generated from page text",
            None => "Generated without page text",
        };
        Ok(LongFormContent {
            description: description.to_string(),
            ..Default::default()
        })
    }
}

pub struct FakeFetcher {
    kind: RecordKind,
    records: Vec<RawRecord>,
    fail: bool,
}

impl FakeFetcher {
    pub fn new(records: Vec<RawRecord>) -> Self {
        let kind = records.first().map(|r| r.kind).unwrap_or(RecordKind::Job);
        Self {
            kind,
            records,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            kind: RecordKind::Job,
            records: vec![],
            fail: true,
        }
    }
}

#[async_trait]
impl RecordFetcher for FakeFetcher {
    fn source(&self) -> &'static str {
        "fake"
    }

    fn kind(&self) -> RecordKind {
        self.kind
    }

    async fn fetch(&self, max_items: usize) -> Result<Vec<RawRecord>, FetchError> {
        if self.fail {
            return Err(FetchError::AllRequestsFailed {
                source_name: self.source().to_string(),
            });
        }
        Ok(self.records.iter().take(max_items).cloned().collect())
    }
}

pub struct FakeScraper {
    page: ScrapedPage,
}

impl FakeScraper {
    pub fn failing() -> Self {
        Self {
            page: ScrapedPage::failed("HTTP 404"),
        }
    }
}

#[async_trait]
impl PageScraper for FakeScraper {
    async fn scrape(&self, _url: &str) -> ScrapedPage {
        self.page.clone()
    }
}

#[derive(Default)]
pub struct FakeImages;

#[async_trait]
impl ImageSearch for FakeImages {
    async fn find_image(&self, category: Category, _tags: &[String]) -> Option<ImageAttribution> {
        Some(ImageAttribution {
            url: format!("https://images.example/{}", category.label().to_lowercase()),
            photographer: "Test Photographer".to_string(),
            photographer_url: "https://images.example/@test".to_string(),
            source_url: "https://images.example/photo".to_string(),
        })
    }
}
