pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::agent::handlers as agent;
use crate::ingest::handlers as ingest;
use crate::state::AppState;
use crate::tscr::handlers as tscr;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Agent tools
        .route("/api/v1/tools", get(agent::handle_list_tools))
        .route("/api/v1/tools/invoke", post(agent::handle_invoke_tool))
        // Sessions and keyword cache
        .route("/api/v1/sessions/:id", delete(tscr::handle_end_session))
        .route("/api/v1/sessions/:id/reply", post(tscr::handle_session_reply))
        .route("/api/v1/cache", get(tscr::handle_cache_stats))
        .route("/api/v1/cache/refresh", post(tscr::handle_refresh_cache))
        // Import administration
        .route("/api/v1/imports", get(ingest::handle_list_runs))
        .route(
            "/api/v1/imports/classify",
            post(ingest::handle_preview_classification),
        )
        .route(
            "/api/v1/recruiters",
            get(ingest::handle_list_recruiters).post(ingest::handle_flag_recruiter),
        )
        .route(
            "/api/v1/recruiters/check",
            get(ingest::handle_check_recruiter),
        )
        .route(
            "/api/v1/recruiters/:id",
            delete(ingest::handle_delete_recruiter),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::agent::tools::ToolRegistry;
    use crate::config::Config;
    use crate::ingest::testing::FakeClassifier;
    use crate::normalize::RoleCategory;
    use crate::tscr::fast_path::FastPath;
    use crate::tscr::keyword_cache::SharedKeywordCache;
    use crate::tscr::pending::InMemoryPendingStore;
    use crate::tscr::session::SessionStore;
    use crate::tscr::testing::FakeSearch;

    fn test_state() -> AppState {
        let db = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        let keyword_cache = SharedKeywordCache::default();
        let fast_path = FastPath::new(
            keyword_cache.clone(),
            Arc::new(InMemoryPendingStore::new(Duration::from_secs(60))),
            Arc::new(FakeSearch::returning(vec![])),
            Arc::new(SessionStore::new()),
        );
        AppState {
            db,
            config: Config {
                database_url: "postgres://nobody@127.0.0.1:1/none".to_string(),
                redis_url: None,
                anthropic_api_key: "test".to_string(),
                port: 0,
                rust_log: "info".to_string(),
                keyword_cache_enabled: false,
                keyword_cache_refresh_secs: 3600,
                tscr_background_timeout_secs: 10,
                tscr_pending_ttl_secs: 300,
            },
            classifier: Arc::new(FakeClassifier::accepting(RoleCategory::Cto, 0.9)),
            keyword_cache,
            fast_path: Arc::new(fast_path),
            tools: Arc::new(ToolRegistry::standard()),
        }
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(test_state()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "fractional-api");
        assert_eq!(body["keyword_cache"]["enabled"], false);
    }

    #[tokio::test]
    async fn test_list_tools() {
        let (status, body) = send(Request::get("/api/v1/tools").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(8));
        assert_eq!(body[0]["name"], "search_jobs");
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool_is_bad_request() {
        let (status, body) = send(post_json(
            "/api/v1/tools/invoke",
            json!({"session_id": "s1", "tool": "send_email", "args": {}}),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_invoke_salary_insights() {
        let (status, body) = send(post_json(
            "/api/v1/tools/invoke",
            json!({"session_id": "s1", "tool": "show_salary_insights"}),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["title"], "Fractional Executive Day Rates (£)");
    }

    #[tokio::test]
    async fn test_invoke_failure_returns_fallback() {
        let (status, body) = send(post_json(
            "/api/v1/tools/invoke",
            json!({"session_id": "s1", "tool": "show_market_dashboard"}),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert!(body["message"].as_str().unwrap().starts_with("Sorry"));
    }

    #[tokio::test]
    async fn test_end_unknown_session() {
        let (status, _) = send(
            Request::delete("/api/v1/sessions/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_reply_routes_affirmations_only() {
        let (status, body) = send(post_json(
            "/api/v1/sessions/s1/reply",
            json!({"message": "what about CFOs?"}),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["handled"], false);
        assert!(body.get("reply").is_none());

        let (status, body) = send(post_json(
            "/api/v1/sessions/s1/reply",
            json!({"message": "Yes please"}),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["handled"], true);
        assert_eq!(body["reply"]["source"], "no_context");
    }

    #[tokio::test]
    async fn test_refresh_disabled_cache_conflicts() {
        let (status, body) = send(post_json("/api/v1/cache/refresh", json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_recruiter_check_requires_company() {
        let (status, _) = send(
            Request::get("/api/v1/recruiters/check?company=%20")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_classify_preview_rejects_bad_threshold() {
        let (status, _) = send(post_json(
            "/api/v1/imports/classify",
            json!({"title": "Fractional CTO", "organization": "Acme", "confidence_threshold": 1.5}),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_classify_preview_for_news_skips_recruiter_lookup() {
        let (status, body) = send(post_json(
            "/api/v1/imports/classify",
            json!({"kind": "news", "title": "Fractional CFOs on the rise", "organization": "FT"}),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["threshold"], 0.7);
        assert!(body.get("recruiter").is_none());
    }
}
