//! Batch import runner, driven by an external scheduler.
//!
//! ```text
//! import --pipeline jobs --confidence-threshold 0.75
//! import --pipeline all --dry-run --max-items 20
//! import status --limit 5
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fractional_api::config::ImportConfig;
use fractional_api::db::{create_pool, run_migrations, IMPORT_POOL_SIZE};
use fractional_api::ingest::classifier::LlmClassifier;
use fractional_api::ingest::enricher::LlmEnricher;
use fractional_api::ingest::fetchers::{ApifyFetcher, RecordFetcher, SerperFetcher};
use fractional_api::ingest::images::UnsplashClient;
use fractional_api::ingest::pipeline::{
    ImportPipeline, RunParams, RunReport, RunStatus, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_MAX_ITEMS,
};
use fractional_api::ingest::scraper::HttpPageScraper;
use fractional_api::ingest::store::{recent_runs, PgImportStore};
use fractional_api::ingest::types::RecordKind;
use fractional_api::llm_client::LlmClient;

#[derive(Parser)]
#[command(name = "import", version, about = "Import fractional executive jobs and news")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Which pipeline to run
    #[arg(long, value_enum, default_value_t = PipelineArg::All)]
    pipeline: PipelineArg,

    /// Minimum classifier confidence to accept a record, in [0, 1]
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence_threshold: f64,

    /// Classify and enrich without writing records
    #[arg(long)]
    dry_run: bool,

    /// Per-source item limit
    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
    max_items: usize,

    /// Scrape each page and generate long-form content
    #[arg(long)]
    full_content: bool,

    /// Attach a stock image to each record
    #[arg(long)]
    with_images: bool,

    /// Trigger a new Apify run and wait for it instead of reading the
    /// latest scheduled run
    #[arg(long)]
    fresh: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List recent import runs
    Status {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PipelineArg {
    Jobs,
    News,
    All,
}

impl PipelineArg {
    fn kinds(self) -> Vec<RecordKind> {
        match self {
            PipelineArg::Jobs => vec![RecordKind::Job],
            PipelineArg::News => vec![RecordKind::News],
            PipelineArg::All => vec![RecordKind::Job, RecordKind::News],
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            eprintln!("import failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every requested pipeline completed.
async fn run(cli: Cli) -> Result<bool> {
    let config = ImportConfig::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "fractional_api={},import={}",
                &config.rust_log, &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = create_pool(&config.database_url, IMPORT_POOL_SIZE).await?;
    run_migrations(&db).await?;

    if let Some(Command::Status { limit }) = cli.command {
        print_status(&db, limit).await?;
        return Ok(true);
    }

    let params = RunParams {
        confidence_threshold: cli.confidence_threshold,
        dry_run: cli.dry_run,
        max_items: cli.max_items,
        full_content: cli.full_content,
        with_images: cli.with_images,
        ..RunParams::default()
    };

    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    let mut pipeline = ImportPipeline::new(
        Arc::new(PgImportStore::new(db.clone())),
        Arc::new(LlmClassifier::new(llm.clone())),
        Arc::new(LlmEnricher::new(llm)),
    );
    if params.full_content {
        pipeline = pipeline.with_scraper(Arc::new(
            HttpPageScraper::new().context("Failed to build page scraper")?,
        ));
    }
    if params.with_images {
        match &config.unsplash_access_key {
            Some(key) => {
                pipeline = pipeline.with_images(Arc::new(
                    UnsplashClient::new(key.clone()).context("Failed to build image client")?,
                ));
            }
            None => warn!("UNSPLASH_ACCESS_KEY not set; images disabled"),
        }
    }

    let mut all_completed = true;
    for kind in cli.pipeline.kinds() {
        let fetchers = fetchers_for(kind, &config, cli.fresh)?;
        if fetchers.is_empty() {
            warn!(pipeline = kind.pipeline_name(), "No sources configured; skipping");
            continue;
        }

        match pipeline.run(kind, &fetchers, &params).await {
            Ok(report) => {
                print_report(&report);
                all_completed &= report.status == RunStatus::Completed;
            }
            Err(e) => {
                error!(pipeline = kind.pipeline_name(), error = %e, "Import run failed");
                eprintln!("{} import failed: {e}", kind.pipeline_name());
                all_completed = false;
            }
        }
    }

    Ok(all_completed)
}

fn fetchers_for(
    kind: RecordKind,
    config: &ImportConfig,
    fresh: bool,
) -> Result<Vec<Arc<dyn RecordFetcher>>> {
    let mut fetchers: Vec<Arc<dyn RecordFetcher>> = Vec::new();
    match kind {
        RecordKind::Job => match &config.apify_token {
            Some(token) => {
                let fetcher = ApifyFetcher::new(token.clone())?.with_fresh_run(fresh);
                fetchers.push(Arc::new(fetcher));
            }
            None => warn!("APIFY_TOKEN not set; skipping job source"),
        },
        RecordKind::News => match &config.serper_api_key {
            Some(key) => fetchers.push(Arc::new(SerperFetcher::new(key.clone())?)),
            None => warn!("SERPER_API_KEY not set; skipping news source"),
        },
    }
    Ok(fetchers)
}

fn print_report(report: &RunReport) {
    let stats = &report.stats;
    info!(
        run_id = %report.run_id,
        pipeline = report.pipeline,
        status = report.status.as_str(),
        "Import run finished"
    );
    println!(
        "{}{} run {}: {}",
        report.pipeline,
        if report.dry_run { " (dry run)" } else { "" },
        report.run_id,
        report.status.as_str()
    );
    println!(
        "  fetched {}  inserted {}  duplicates {}  filtered {}  errored {}",
        stats.fetched, stats.inserted, stats.duplicates, stats.filtered, stats.errored
    );
    println!(
        "  filtered: {} recruiter, {} not relevant, {} low confidence",
        stats.recruiters_blocked, stats.not_relevant, stats.low_confidence
    );
    for message in &stats.errors {
        println!("  error: {message}");
    }
}

async fn print_status(db: &sqlx::PgPool, limit: i64) -> Result<()> {
    let runs = recent_runs(db, limit.clamp(1, 100)).await?;
    if runs.is_empty() {
        println!("No import runs recorded.");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {:<5} {:<9} started {}  fetched {} inserted {} dup {} filtered {} errored {}",
            run.id,
            run.pipeline,
            run.status,
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.items_fetched,
            run.items_inserted,
            run.items_duplicates,
            run.items_filtered,
            run.items_errored,
        );
        if let Some(message) = run.error_message {
            println!("    error: {message}");
        }
    }
    Ok(())
}
