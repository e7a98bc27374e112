//! Test helpers: build an `AppState` wired to in-memory collaborators and a
//! tempdir-backed local storage, then drive the handlers directly.
//!
//! Run from workspace root: `cargo test -p thumbly-api --test thumbnails_test`
//! or `cargo test -p thumbly-api`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thumbly_api::error::ValidatedJson;
use thumbly_api::extractors::AuthUser;
use thumbly_api::handlers::{jobs, thumbnails};
use thumbly_api::state::AppState;
use thumbly_core::models::{Document, GenerationJob, Variant};
use thumbly_core::{BaseConfig, Config, StorageBackend, ThumbnailServiceConfig};
use thumbly_services::fakes::{
    AllowListAccess, InMemoryDocuments, RecordingAuditSink, StaticHouseholds,
};
use thumbly_services::Storage;
use thumbly_storage::LocalStorage;
use thumbly_worker::{PlaceholderRenderWorker, RenderWorker};
use uuid::Uuid;

const TEST_SIGNING_SECRET: &str = "0123456789abcdef0123456789abcdef";
const TEST_BASE_URL: &str = "http://localhost:4000";

/// Test application: shared state plus handles on the injected fakes.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub documents: InMemoryDocuments,
    pub access: AllowListAccess,
    pub households: StaticHouseholds,
    pub audit: RecordingAuditSink,
    pub storage: Arc<dyn Storage>,
    pub _temp_dir: TempDir,
}

/// Default test configuration: local storage under `storage_path`, generous
/// rate limits so only the rate-limit tests ever trip them.
pub fn test_config(storage_path: &std::path::Path) -> ThumbnailServiceConfig {
    ThumbnailServiceConfig {
        base: BaseConfig {
            server_port: 4000,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),
        },
        storage_backend: Some(StorageBackend::Local),
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        local_storage_path: Some(storage_path.display().to_string()),
        local_storage_base_url: Some(TEST_BASE_URL.to_string()),
        url_signing_secret: Some(TEST_SIGNING_SECRET.to_string()),
        signed_url_ttl_minutes: 15,
        url_cache_ttl_margin_secs: 30,
        rate_limit_capacity: 50.0,
        rate_limit_refill_per_sec: 25.0,
        coalescing_ceiling_secs: 120,
        job_queue_size: 64,
        job_max_concurrent: 4,
        thumbnail_variants: Variant::ALL.to_vec(),
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Build a test app after letting the caller adjust the configuration.
pub async fn setup_test_app_with(mutate: impl FnOnce(&mut ThumbnailServiceConfig)) -> TestApp {
    build_app(mutate, |storage| {
        Arc::new(PlaceholderRenderWorker::new(storage))
    })
    .await
}

/// Build a test app whose worker fails the given variants, for exercising
/// partial-success job statuses.
pub async fn setup_test_app_failing(fail_variants: Vec<Variant>) -> TestApp {
    build_app(
        |_| {},
        move |storage| Arc::new(PlaceholderRenderWorker::with_failures(storage, fail_variants)),
    )
    .await
}

/// Build a test app whose worker sleeps before rendering, so jobs stay
/// in flight long enough for concurrent readers to join them.
pub async fn setup_test_app_slow(delay: Duration) -> TestApp {
    build_app(
        |_| {},
        move |storage| {
            Arc::new(SlowRenderWorker {
                delay,
                inner: PlaceholderRenderWorker::new(storage),
            })
        },
    )
    .await
}

async fn build_app(
    mutate: impl FnOnce(&mut ThumbnailServiceConfig),
    make_worker: impl FnOnce(Arc<dyn Storage>) -> Arc<dyn RenderWorker>,
) -> TestApp {
    let temp_dir = TempDir::new().expect("create temp dir");
    let mut config = test_config(temp_dir.path());
    mutate(&mut config);

    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(
            temp_dir.path(),
            TEST_BASE_URL.to_string(),
            TEST_SIGNING_SECRET.as_bytes().to_vec(),
        )
        .await
        .expect("create local storage"),
    );

    let documents = InMemoryDocuments::new();
    let access = AllowListAccess::new();
    let households = StaticHouseholds::new();
    let audit = RecordingAuditSink::new();
    let worker = make_worker(Arc::clone(&storage));

    let state = Arc::new(AppState::new(
        Config(Box::new(config)),
        Arc::clone(&storage),
        Arc::new(documents.clone()),
        Arc::new(access.clone()),
        Arc::new(households.clone()),
        Arc::new(audit.clone()),
        worker,
    ));

    TestApp {
        state,
        documents,
        access,
        households,
        audit,
        storage,
        _temp_dir: temp_dir,
    }
}

/// Render worker that delays before delegating to the placeholder.
struct SlowRenderWorker {
    delay: Duration,
    inner: PlaceholderRenderWorker,
}

#[async_trait]
impl RenderWorker for SlowRenderWorker {
    async fn render(&self, job: &GenerationJob, variant: Variant) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.render(job, variant).await
    }
}

/// Insert a document and grant `user_id` read access to it.
pub async fn seed_document(app: &TestApp, user_id: Uuid, source_hash: Option<&str>) -> Uuid {
    let document_id = Uuid::new_v4();
    app.documents
        .insert(Document {
            id: document_id,
            owner_id: user_id,
            household_id: None,
            mime_type: "application/pdf".to_string(),
            storage_path: format!("documents/{}.pdf", document_id),
            source_hash: source_hash.map(String::from),
            updated_at: Utc::now(),
        })
        .await;
    app.access.grant(user_id, document_id).await;
    document_id
}

async fn read_response(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse response body")
    };
    (status, body)
}

pub async fn get_thumbnail(
    app: &TestApp,
    user_id: Uuid,
    document_id: &str,
    variant: Option<&str>,
) -> (StatusCode, Value) {
    let result = thumbnails::get_thumbnail(
        State(app.state.clone()),
        AuthUser(user_id),
        Path(document_id.to_string()),
        Query(thumbnails::VariantQuery {
            variant: variant.map(String::from),
        }),
    )
    .await;
    let response = match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    read_response(response).await
}

pub async fn regenerate(
    app: &TestApp,
    user_id: Uuid,
    document_id: &str,
    variants: Vec<u32>,
) -> (StatusCode, Value) {
    let result = thumbnails::regenerate_thumbnails(
        State(app.state.clone()),
        AuthUser(user_id),
        ValidatedJson(thumbnails::RegenerateRequest {
            document_id: document_id.to_string(),
            variants,
        }),
    )
    .await;
    let response = match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    read_response(response).await
}

pub async fn job_status(
    app: &TestApp,
    user_id: Uuid,
    job_id: &str,
    variant: Option<&str>,
) -> (StatusCode, Value) {
    let result = jobs::get_job_status(
        State(app.state.clone()),
        AuthUser(user_id),
        Path(job_id.to_string()),
        Query(thumbnails::VariantQuery {
            variant: variant.map(String::from),
        }),
    )
    .await;
    let response = match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    read_response(response).await
}

/// Poll the job store until the job settles. Panics if it never does.
pub async fn wait_job_terminal(app: &TestApp, job_id: Uuid) {
    for _ in 0..500 {
        if let Some(job) = app.state.job_queue.job(job_id).await {
            if job.is_terminal() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not settle in time", job_id);
}

pub fn job_id_from(body: &Value) -> Uuid {
    body.get("jobId")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("response carries a jobId")
}

pub fn error_code_of(body: &Value) -> &str {
    body.get("errorCode")
        .and_then(|v| v.as_str())
        .expect("error response carries an errorCode")
}
