use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fractional_api::agent::tools::ToolRegistry;
use fractional_api::config::Config;
use fractional_api::db::{create_pool, run_migrations, API_POOL_SIZE};
use fractional_api::ingest::classifier::LlmClassifier;
use fractional_api::llm_client::{self, LlmClient};
use fractional_api::routes::build_router;
use fractional_api::state::AppState;
use fractional_api::tscr::fast_path::FastPath;
use fractional_api::tscr::keyword_cache::SharedKeywordCache;
use fractional_api::tscr::pending::{InMemoryPendingStore, PendingResults, RedisPendingStore};
use fractional_api::tscr::search::PgJobSearch;
use fractional_api::tscr::session::{SessionStore, SESSION_IDLE_TIMEOUT, SESSION_SWEEP_INTERVAL};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("fractional_api={},api={}", &config.rust_log, &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Fractional API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url, API_POOL_SIZE).await?;
    run_migrations(&db).await?;

    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let shutdown = CancellationToken::new();

    // Keyword cache: built before serving, then refreshed in the background
    let keyword_cache = SharedKeywordCache::default();
    if config.keyword_cache_enabled {
        if let Err(e) = keyword_cache.rebuild(&db).await {
            warn!(
                error = %e,
                "Initial keyword cache build failed; lookups fall back to full search"
            );
        }
        keyword_cache.spawn_refresh(
            db.clone(),
            Duration::from_secs(config.keyword_cache_refresh_secs),
            shutdown.clone(),
        );
    } else {
        info!("Keyword cache disabled; skipping build");
    }

    let pending_ttl = Duration::from_secs(config.tscr_pending_ttl_secs);
    let pending: Arc<dyn PendingResults> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Pending results stored in Redis");
            Arc::new(RedisPendingStore::new(client, pending_ttl))
        }
        None => {
            info!("Pending results stored in process memory");
            Arc::new(InMemoryPendingStore::new(pending_ttl))
        }
    };

    let sessions = Arc::new(SessionStore::new());
    sessions.clone().spawn_sweeper(
        SESSION_SWEEP_INTERVAL,
        SESSION_IDLE_TIMEOUT,
        shutdown.clone(),
    );

    let fast_path = FastPath::new(
        keyword_cache.clone(),
        pending,
        Arc::new(PgJobSearch::new(db.clone())),
        sessions,
    )
    .with_background_timeout(Duration::from_secs(config.tscr_background_timeout_secs));

    let state = AppState {
        db,
        config: config.clone(),
        classifier: Arc::new(LlmClassifier::new(llm)),
        keyword_cache,
        fast_path: Arc::new(fast_path),
        tools: Arc::new(ToolRegistry::standard()),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C and stops the background tasks.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    shutdown.cancel();
}
