//! Import orchestration: one end-to-end run over a fetched batch.
//!
//! Per record, in fetch order and strictly one at a time:
//! dedup → recruiter filter (jobs) → classify → threshold → enrich → persist.
//!
//! Per-record failures (storage errors, panics inside a stage) are recorded
//! in the run's error list and processing moves on. Only run-level setup
//! and teardown failures (claiming the run, loading recruiter patterns,
//! fetching the batch, finalizing the run) fail the run.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ingest::classifier::RelevanceClassifier;
use crate::ingest::dedup::{find_duplicate, DuplicateMatch, SeenRecords};
use crate::ingest::enricher::{enforce_caps, fallback_enrichment, ContentEnricher};
use crate::ingest::fetchers::{FetchError, RecordFetcher};
use crate::ingest::fingerprint::content_hash;
use crate::ingest::images::ImageSearch;
use crate::ingest::recruiter::{record_block, RecruiterFilter, RecruiterMatch};
use crate::ingest::scraper::PageScraper;
use crate::ingest::store::{ImportStore, RunOutcome, StoreError};
use crate::ingest::text::generate_slug;
use crate::ingest::types::{
    Category, ClassificationResult, EnrichedRecord, LongFormContent, RawRecord, RecordKind,
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_ITEMS: usize = 100;
pub const DEFAULT_RUN_LEASE: Duration = Duration::from_secs(2 * 60 * 60);
/// Errors kept on the run (in memory and persisted); the counter is unbounded.
pub const MAX_PERSISTED_ERRORS: usize = 10;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("an import run for '{pipeline}' is already in progress")]
    RunInProgress { pipeline: String },

    #[error("invalid run parameters: {0}")]
    InvalidParams(String),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Operational surface of one run.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub confidence_threshold: f64,
    /// Compute and log everything, persist nothing.
    pub dry_run: bool,
    /// Per-source item limit.
    pub max_items: usize,
    /// Scrape the page and generate long-form sections (jobs only).
    pub full_content: bool,
    pub with_images: bool,
    pub lease: Duration,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            dry_run: false,
            max_items: DEFAULT_MAX_ITEMS,
            full_content: false,
            with_images: false,
            lease: DEFAULT_RUN_LEASE,
        }
    }
}

impl RunParams {
    pub fn validate(&self) -> Result<(), ImportError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ImportError::InvalidParams(format!(
                "confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.max_items == 0 {
            return Err(ImportError::InvalidParams(
                "max items must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Aggregate counters of a run. `filtered` covers recruiter, not-relevant
/// and low-confidence rejections; the breakdown is kept alongside.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportStats {
    pub fetched: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub inserted: usize,
    pub errored: usize,
    pub errors: Vec<String>,
    pub recruiters_blocked: usize,
    pub not_relevant: usize,
    pub low_confidence: usize,
}

impl ImportStats {
    fn record_error(&mut self, message: String) {
        self.errored += 1;
        if self.errors.len() < MAX_PERSISTED_ERRORS {
            self.errors.push(message);
        }
    }

    fn tally(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Inserted { .. } => self.inserted += 1,
            RecordOutcome::Duplicate(_) => self.duplicates += 1,
            RecordOutcome::Recruiter(_) => {
                self.filtered += 1;
                self.recruiters_blocked += 1;
            }
            RecordOutcome::NotRelevant { .. } => {
                self.filtered += 1;
                self.not_relevant += 1;
            }
            RecordOutcome::LowConfidence { .. } => {
                self.filtered += 1;
                self.low_confidence += 1;
            }
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// `id` is `None` in dry-run mode.
    Inserted { id: Option<Uuid> },
    Duplicate(DuplicateMatch),
    Recruiter(RecruiterMatch),
    NotRelevant { score: f64 },
    LowConfidence { score: f64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline: &'static str,
    pub status: RunStatus,
    pub dry_run: bool,
    pub stats: ImportStats,
}

/// Collaborators shared by every record of a run.
struct RecordContext {
    store: Arc<dyn ImportStore>,
    classifier: Arc<dyn RelevanceClassifier>,
    enricher: Arc<dyn ContentEnricher>,
    scraper: Option<Arc<dyn PageScraper>>,
    images: Option<Arc<dyn ImageSearch>>,
    filter: RecruiterFilter,
    params: RunParams,
    /// Would-be inserts of a dry run.
    dry_run_seen: Mutex<SeenRecords>,
}

pub struct ImportPipeline {
    store: Arc<dyn ImportStore>,
    classifier: Arc<dyn RelevanceClassifier>,
    enricher: Arc<dyn ContentEnricher>,
    scraper: Option<Arc<dyn PageScraper>>,
    images: Option<Arc<dyn ImageSearch>>,
}

impl ImportPipeline {
    pub fn new(
        store: Arc<dyn ImportStore>,
        classifier: Arc<dyn RelevanceClassifier>,
        enricher: Arc<dyn ContentEnricher>,
    ) -> Self {
        Self {
            store,
            classifier,
            enricher,
            scraper: None,
            images: None,
        }
    }

    pub fn with_scraper(mut self, scraper: Arc<dyn PageScraper>) -> Self {
        self.scraper = Some(scraper);
        self
    }

    pub fn with_images(mut self, images: Arc<dyn ImageSearch>) -> Self {
        self.images = Some(images);
        self
    }

    /// Runs one pipeline end to end and finalizes its run row exactly once.
    pub async fn run(
        &self,
        kind: RecordKind,
        fetchers: &[Arc<dyn RecordFetcher>],
        params: &RunParams,
    ) -> Result<RunReport, ImportError> {
        params.validate()?;
        let pipeline = kind.pipeline_name();

        let run_id = self
            .store
            .start_run(pipeline, params.lease)
            .await?
            .ok_or_else(|| ImportError::RunInProgress {
                pipeline: pipeline.to_string(),
            })?;

        info!(
            %run_id,
            pipeline,
            threshold = params.confidence_threshold,
            dry_run = params.dry_run,
            "Import run started"
        );

        let mut stats = ImportStats::default();
        let result = self.execute(kind, fetchers, params, &mut stats).await;

        match result {
            Ok(()) => {
                self.store
                    .complete_run(
                        run_id,
                        RunOutcome {
                            status: RunStatus::Completed,
                            stats: &stats,
                            error: None,
                        },
                    )
                    .await?;

                info!(
                    %run_id,
                    pipeline,
                    fetched = stats.fetched,
                    duplicates = stats.duplicates,
                    filtered = stats.filtered,
                    inserted = stats.inserted,
                    errored = stats.errored,
                    "Import run completed"
                );

                Ok(RunReport {
                    run_id,
                    pipeline,
                    status: RunStatus::Completed,
                    dry_run: params.dry_run,
                    stats,
                })
            }
            Err(e) => {
                let message = e.to_string();
                error!(%run_id, pipeline, error = %message, "Import run failed");
                let finalize = self
                    .store
                    .complete_run(
                        run_id,
                        RunOutcome {
                            status: RunStatus::Failed,
                            stats: &stats,
                            error: Some(&message),
                        },
                    )
                    .await;
                if let Err(fe) = finalize {
                    error!(%run_id, error = %fe, "Failed to mark import run as failed");
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        kind: RecordKind,
        fetchers: &[Arc<dyn RecordFetcher>],
        params: &RunParams,
        stats: &mut ImportStats,
    ) -> Result<(), ImportError> {
        let filter = match kind {
            RecordKind::Job => {
                let patterns = self.store.load_recruiter_patterns().await?;
                info!(patterns = patterns.len(), "Loaded recruiter patterns");
                RecruiterFilter::new(patterns)
            }
            RecordKind::News => RecruiterFilter::default(),
        };

        let mut records = Vec::new();
        for fetcher in fetchers {
            if fetcher.kind() != kind {
                warn!(source = fetcher.source(), "Skipping fetcher for a different pipeline");
                continue;
            }
            let batch = fetcher.fetch(params.max_items).await?;
            info!(source = fetcher.source(), count = batch.len(), "Fetched batch");
            records.extend(batch);
        }
        stats.fetched = records.len();

        let ctx = Arc::new(RecordContext {
            store: self.store.clone(),
            classifier: self.classifier.clone(),
            enricher: self.enricher.clone(),
            scraper: self.scraper.clone(),
            images: self.images.clone(),
            filter,
            params: params.clone(),
            dry_run_seen: Mutex::new(SeenRecords::default()),
        });

        for (index, record) in records.into_iter().enumerate() {
            let title = record.title.clone();
            let ctx = ctx.clone();
            // Awaited immediately: one record at a time, but a panic in any
            // stage is contained to this record.
            let handle = tokio::spawn(async move { ctx.process(&record).await });

            match handle.await {
                Ok(Ok(outcome)) => stats.tally(&outcome),
                Ok(Err(e)) => {
                    warn!(index, %title, error = %e, "Record failed");
                    stats.record_error(format!("{title}: {e}"));
                }
                Err(join_error) => {
                    warn!(index, %title, error = %join_error, "Record processing aborted");
                    stats.record_error(format!("{title}: processing aborted ({join_error})"));
                }
            }
        }

        Ok(())
    }
}

impl RecordContext {
    async fn process(&self, record: &RawRecord) -> Result<RecordOutcome, StoreError> {
        let hash = content_hash(record);

        if let Some(matched) = find_duplicate(self.store.as_ref(), record, &hash).await? {
            info!(title = %record.title, key = matched.as_str(), "Skipping duplicate");
            return Ok(RecordOutcome::Duplicate(matched));
        }
        if self.params.dry_run {
            if let Some(matched) = self.dry_run_seen.lock().await.find(record, &hash) {
                info!(
                    title = %record.title,
                    key = matched.as_str(),
                    "Skipping duplicate within run"
                );
                return Ok(RecordOutcome::Duplicate(matched));
            }
        }

        if record.kind == RecordKind::Job {
            if let Some(hit) = self.filter.check(
                &record.organization,
                Some(record.description.as_str()),
                &record.source,
            ) {
                info!(
                    title = %record.title,
                    company = %record.organization,
                    rule = %hit,
                    "Filtered recruiter posting"
                );
                record_block(self.store.as_ref(), &hit).await;
                return Ok(RecordOutcome::Recruiter(hit));
            }
        }

        let classification = match self.classifier.classify(record).await {
            Ok(result) => result,
            Err(e) => {
                warn!(title = %record.title, error = %e, "Classifier failed, rejecting record");
                ClassificationResult::rejected(format!("classification error: {e}"))
            }
        };

        if !classification.is_relevant {
            info!(
                title = %record.title,
                score = classification.score,
                rationale = %classification.rationale,
                "Rejected: not relevant"
            );
            return Ok(RecordOutcome::NotRelevant {
                score: classification.score,
            });
        }
        if classification.score < self.params.confidence_threshold {
            info!(
                title = %record.title,
                score = classification.score,
                threshold = self.params.confidence_threshold,
                "Rejected: below confidence threshold"
            );
            return Ok(RecordOutcome::LowConfidence {
                score: classification.score,
            });
        }

        let category = classification
            .category
            .unwrap_or_else(|| Category::other_for(record.kind));

        let enriched = self.enrich(record, category, hash).await;

        if self.params.dry_run {
            self.dry_run_seen
                .lock()
                .await
                .remember(&enriched.raw, &enriched.content_hash);
            info!(
                title = %enriched.raw.title,
                slug = %enriched.slug,
                category = category.label(),
                "Dry run: would insert"
            );
            return Ok(RecordOutcome::Inserted { id: None });
        }

        let id = self.store.insert_record(&enriched).await?;
        info!(%id, title = %enriched.raw.title, category = category.label(), "Inserted record");
        Ok(RecordOutcome::Inserted { id: Some(id) })
    }

    /// Builds the persisted unit. External failures degrade to fallbacks.
    async fn enrich(&self, record: &RawRecord, category: Category, hash: String) -> EnrichedRecord {
        let enrichment = match self.enricher.enrich(record, category).await {
            Ok(enrichment) => enforce_caps(record.kind, enrichment),
            Err(e) => {
                warn!(title = %record.title, error = %e, "Enrichment failed, using fallback");
                fallback_enrichment(record, category)
            }
        };

        let long_form = if self.params.full_content && record.kind == RecordKind::Job {
            self.long_form(record, category).await
        } else {
            None
        };

        let image = match (&self.images, self.params.with_images) {
            (Some(images), true) => images.find_image(category, &enrichment.keywords).await,
            _ => None,
        };

        let mut slug = generate_slug(&record.title, &record.organization);
        if slug.is_empty() {
            slug = format!("{}-{}", record.kind.pipeline_name(), &hash[..12]);
        }

        EnrichedRecord {
            raw: record.clone(),
            slug,
            content_hash: hash,
            category,
            enrichment,
            long_form,
            image,
        }
    }

    async fn long_form(&self, record: &RawRecord, category: Category) -> Option<LongFormContent> {
        let page = match &self.scraper {
            Some(scraper) => Some(scraper.scrape(&record.url).await),
            None => None,
        };
        let page_text = page.as_ref().and_then(|p| p.usable_text());

        match self
            .enricher
            .generate_full_content(record, category, page_text)
            .await
        {
            Ok(content) => Some(content),
            Err(e) => {
                warn!(title = %record.title, error = %e, "Long-form generation failed, skipping");
                None
            }
        }
    }
}
