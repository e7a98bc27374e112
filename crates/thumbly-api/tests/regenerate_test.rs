//! Explicit regeneration integration tests.
//!
//! Run with: `cargo test -p thumbly-api --test regenerate_test`

mod helpers;

use axum::http::StatusCode;
use helpers::{
    error_code_of, get_thumbnail, job_id_from, regenerate, seed_document, setup_test_app,
    setup_test_app_with, wait_job_terminal,
};
use uuid::Uuid;

#[tokio::test]
async fn test_regeneration_queues_even_when_objects_exist() {
    let app = setup_test_app().await;
    let user_id = Uuid::new_v4();
    let document_id = seed_document(&app, user_id, Some("h1")).await;
    let id = document_id.to_string();

    let (_, queued) = get_thumbnail(&app, user_id, &id, Some("96")).await;
    let first_job = job_id_from(&queued);
    wait_job_terminal(&app, first_job).await;

    // Objects exist and the read path would answer ready; regeneration must
    // still enqueue a fresh job.
    let (status, body) = regenerate(&app, user_id, &id, vec![]).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    assert_ne!(job_id_from(&body), first_job);
    assert_eq!(
        body["variants"],
        serde_json::json!([96, 240, 480]),
        "empty variant list defaults to the full configured set"
    );
    assert_eq!(app.state.job_queue.store().len().await, 2);
}

#[tokio::test]
async fn test_repeated_regeneration_creates_new_jobs() {
    let app = setup_test_app().await;
    let user_id = Uuid::new_v4();
    let document_id = seed_document(&app, user_id, Some("h1")).await;
    let id = document_id.to_string();

    let (status, first) = regenerate(&app, user_id, &id, vec![240]).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, second) = regenerate(&app, user_id, &id, vec![240]).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    assert_ne!(job_id_from(&first), job_id_from(&second));
    assert_eq!(app.state.job_queue.store().len().await, 2);
}

#[tokio::test]
async fn test_regeneration_requires_canonical_source_hash() {
    let app = setup_test_app().await;
    let user_id = Uuid::new_v4();
    let document_id = seed_document(&app, user_id, None).await;

    let (status, body) = regenerate(&app, user_id, &document_id.to_string(), vec![]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code_of(&body), "MISSING_SOURCE_HASH");
    assert!(app.state.job_queue.store().is_empty().await);
}

#[tokio::test]
async fn test_regeneration_rejects_unsupported_variant() {
    let app = setup_test_app().await;
    let user_id = Uuid::new_v4();
    let document_id = seed_document(&app, user_id, Some("h1")).await;

    let (status, body) =
        regenerate(&app, user_id, &document_id.to_string(), vec![96, 97]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code_of(&body), "INVALID_VARIANT");
    assert!(app.state.job_queue.store().is_empty().await);
}

#[tokio::test]
async fn test_regeneration_with_variant_subset() {
    let app = setup_test_app().await;
    let user_id = Uuid::new_v4();
    let document_id = seed_document(&app, user_id, Some("h1")).await;

    let (status, body) = regenerate(&app, user_id, &document_id.to_string(), vec![96]).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["variants"], serde_json::json!([96]));

    let job = app
        .state
        .job_queue
        .job(job_id_from(&body))
        .await
        .expect("job exists");
    assert_eq!(job.variants.len(), 1);
}

#[tokio::test]
async fn test_regeneration_enforces_document_checks() {
    let app = setup_test_app().await;
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let document_id = seed_document(&app, owner, Some("h1")).await;

    let (status, body) =
        regenerate(&app, stranger, &document_id.to_string(), vec![]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code_of(&body), "ACCESS_DENIED");

    let (status, body) = regenerate(&app, owner, &Uuid::new_v4().to_string(), vec![]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code_of(&body), "DOCUMENT_NOT_FOUND");

    let (status, body) = regenerate(&app, owner, "not-a-uuid", vec![]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code_of(&body), "INVALID_DOCUMENT_ID");
}

#[tokio::test]
async fn test_regeneration_rate_limited_gets_soft_queued() {
    let app = setup_test_app_with(|config| {
        config.rate_limit_capacity = 1.0;
        config.rate_limit_refill_per_sec = 0.5;
    })
    .await;
    let user_id = Uuid::new_v4();
    let document_id = seed_document(&app, user_id, Some("h1")).await;
    let id = document_id.to_string();

    let (status, _) = regenerate(&app, user_id, &id, vec![96]).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = regenerate(&app, user_id, &id, vec![96]).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    assert!(body["retryAfterMs"].as_u64().unwrap() > 0);
    assert!(body.get("jobId").is_none());
    assert_eq!(app.state.job_queue.store().len().await, 1);
}
