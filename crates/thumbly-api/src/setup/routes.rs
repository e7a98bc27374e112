//! Route configuration and setup

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use thumbly_core::Config;
use thumbly_infra::{request_id_middleware, security_headers_middleware};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// The API only accepts small JSON bodies.
const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Interval between in-memory hygiene sweeps.
const HYGIENE_INTERVAL: Duration = Duration::from_secs(300);

/// How long terminal jobs stay queryable before the sweep drops them.
const JOB_RETENTION_HOURS: i64 = 24;

/// Setup all application routes
pub async fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;

    spawn_hygiene_tasks(&state);

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let app = public_routes(state.clone())
        .merge(thumbnail_routes(state.clone()))
        .nest(
            "/docs",
            utoipa_rapidoc::RapiDoc::new("/api/openapi.json")
                .path("/docs")
                .into(),
        )
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().contains(&"*".to_string()) {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins: Result<Vec<HeaderValue>, _> =
            config.cors_origins().iter().map(|o| o.parse()).collect();

        CorsLayer::new()
            .allow_origin(origins.unwrap_or_default())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Periodic sweeps over the in-memory maps: idle rate-limit buckets,
/// expired cached URLs, and settled render jobs past retention.
fn spawn_hygiene_tasks(state: &Arc<AppState>) {
    let state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HYGIENE_INTERVAL);
        // The first tick fires immediately; skip it so startup stays quiet.
        interval.tick().await;
        loop {
            interval.tick().await;
            let buckets = state.rate_limiter.prune_idle().await;
            let urls = state.url_cache.purge_expired().await;
            let marks = state.coalescing.sweep_stale().await;
            let jobs = state
                .job_queue
                .store()
                .purge_finished(chrono::Duration::hours(JOB_RETENTION_HOURS))
                .await;
            tracing::debug!(
                pruned_buckets = buckets,
                purged_urls = urls,
                swept_marks = marks,
                purged_jobs = jobs,
                "Hygiene sweep completed"
            );
        }
    });
}

/// Health and documentation routes (no authentication required)
fn public_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/live", get(liveness_check))
        .route("/ready", get(readiness_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .with_state(state)
}

/// Thumbnail routes
fn thumbnail_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/documents/{{id}}/thumbnail", API_PREFIX),
            get(handlers::thumbnails::get_thumbnail),
        )
        .route(
            &format!("{}/thumbnails", API_PREFIX),
            post(handlers::thumbnails::regenerate_thumbnails),
        )
        .route(
            &format!("{}/thumbnails/job/{{job_id}}", API_PREFIX),
            get(handlers::jobs::get_job_status),
        )
        .with_state(state)
}

#[derive(serde::Serialize)]
struct HealthCheckResponse {
    status: String,
    storage: String,
}

/// Liveness probe - simple check that process is running
/// Always returns 200 if process can respond
async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive"
        })),
    )
}

/// Readiness probe - checks if service can accept traffic
async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    const TIMEOUT: Duration = Duration::from_secs(5);

    // The exists probe on a never-written key verifies backend connectivity
    // without creating objects.
    let ready = matches!(
        tokio::time::timeout(
            TIMEOUT,
            state.storage.exists("health-check-non-existent-key"),
        )
        .await,
        Ok(Ok(_))
    );

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" }
        })),
    )
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    const TIMEOUT: Duration = Duration::from_secs(5);

    let mut response = HealthCheckResponse {
        status: "healthy".to_string(),
        storage: "unknown".to_string(),
    };

    match tokio::time::timeout(
        TIMEOUT,
        state.storage.exists("health-check-non-existent-key"),
    )
    .await
    {
        Ok(Ok(_)) => {
            response.storage = "healthy".to_string();
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Storage health check warning");
            response.storage = format!("degraded: {}", e);
        }
        Err(_) => {
            tracing::warn!("Storage health check timed out");
            response.storage = "timeout".to_string();
        }
    }

    // Storage degradation does not fail overall health: signed URLs may
    // still be served from cache while the backend recovers.
    (StatusCode::OK, Json(response))
}
