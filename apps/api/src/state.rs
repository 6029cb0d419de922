use std::sync::Arc;

use sqlx::PgPool;

use crate::agent::tools::ToolRegistry;
use crate::config::Config;
use crate::ingest::classifier::RelevanceClassifier;
use crate::tscr::fast_path::FastPath;
use crate::tscr::keyword_cache::SharedKeywordCache;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Used by the admin classification preview.
    pub classifier: Arc<dyn RelevanceClassifier>,
    /// Current keyword cache build; refreshed in the background and on demand.
    pub keyword_cache: SharedKeywordCache,
    /// Sessions, pending results and full search all hang off the fast path.
    pub fast_path: Arc<FastPath>,
    pub tools: Arc<ToolRegistry>,
}
