//! Thumbnail delivery and regeneration handlers.
//!
//! The read path runs a fixed sequence: rate check, resolve and authorize,
//! URL cache, existence probe, then either a signed URL or the coalesced
//! queue path. Validation failures short-circuit before any of it.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thumbly_core::models::{JobRequest, Variant};
use thumbly_core::AppError;
use thumbly_services::{keys, IssueOutcome, ResolvedDocument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::{QUEUED_RETRY_HINT_MS, QUEUE_FULL_RETRY_HINT_MS};
use crate::error::{HttpAppError, ValidatedJson};
use crate::extractors::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VariantQuery {
    pub variant: Option<String>,
}

/// A thumbnail ready to fetch.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailReadyResponse {
    /// Always "ready".
    pub status: String,
    /// Time-limited signed URL for the rendered object.
    pub url: String,
    /// Seconds the URL remains valid.
    pub ttl_seconds: u64,
    /// Edge size in pixels.
    pub variant: u32,
    /// Content version the thumbnail was rendered from.
    pub source_hash: String,
}

/// Rendering is (or will be) in flight; come back later.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailQueuedResponse {
    /// Always "queued".
    pub status: String,
    /// Suggested client poll delay in milliseconds.
    pub retry_after_ms: u64,
    /// Id of the render job covering this request, when one is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    /// Content version the job renders, when the document was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    pub document_id: String,
    /// Edge sizes to re-render. Empty means the full configured set.
    #[serde(default)]
    pub variants: Vec<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateResponse {
    /// Always "queued".
    pub status: String,
    pub job_id: Uuid,
    pub variants: Vec<u32>,
}

pub(crate) fn parse_variant(raw: Option<&str>) -> Result<Variant, AppError> {
    let raw = raw.ok_or_else(|| {
        AppError::InvalidVariant("variant query parameter is required".to_string())
    })?;
    let px: u32 = raw.parse().map_err(|_| {
        AppError::InvalidVariant(format!(
            "Unsupported thumbnail variant: {} (supported: 96, 240, 480)",
            raw
        ))
    })?;
    Variant::try_from(px).map_err(AppError::InvalidVariant)
}

fn parse_document_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidDocumentId(format!("Invalid document id: {}", raw)))
}

fn ready_response(url: String, ttl_seconds: u64, variant: Variant, source_hash: &str) -> Response {
    (
        StatusCode::OK,
        Json(ThumbnailReadyResponse {
            status: "ready".to_string(),
            url,
            ttl_seconds,
            variant: variant.px(),
            source_hash: source_hash.to_string(),
        }),
    )
        .into_response()
}

fn queued_response(
    retry_after_ms: u64,
    job_id: Option<Uuid>,
    source_hash: Option<String>,
) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(ThumbnailQueuedResponse {
            status: "queued".to_string(),
            retry_after_ms,
            job_id,
            source_hash,
        }),
    )
        .into_response()
}

/// Get a signed URL for a rendered thumbnail, queueing a render when the
/// object does not exist yet.
#[utoipa::path(
    get,
    path = "/api/v0/documents/{id}/thumbnail",
    tag = "thumbnails",
    params(
        ("id" = String, Path, description = "Document id"),
        ("variant" = Option<String>, Query, description = "Edge size in pixels (96, 240 or 480)"),
        ("x-user-id" = String, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Thumbnail is rendered; signed URL returned", body = ThumbnailReadyResponse),
        (status = 202, description = "Rendering queued or rate limited", body = ThumbnailQueuedResponse),
        (status = 400, description = "Invalid document id or unsupported variant", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not read this document", body = crate::error::ErrorResponse),
        (status = 404, description = "Document does not exist", body = crate::error::ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, query), fields(user_id = %user.0))]
pub async fn get_thumbnail(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<VariantQuery>,
) -> Result<Response, HttpAppError> {
    // Input validation rejects before the rate limiter or any provider call.
    let variant = parse_variant(query.variant.as_deref())?;
    let document_id = parse_document_id(&id)?;

    // Denial is soft: the client is told to come back, never given an error.
    if !state.rate_limiter.try_acquire(user.0).await {
        let retry = state.rate_limiter.retry_after(user.0).await;
        let retry_ms = (retry.as_millis() as u64).max(1);
        return Ok(queued_response(retry_ms, None, None));
    }

    let resolved = state.issuer.resolve_document(user.0, document_id).await?;

    let cache_key = keys::thumbnail_key(document_id, &resolved.content_version, variant);
    if let Some(cached) = state.url_cache.get(&cache_key).await {
        tracing::debug!(document_id = %document_id, variant = variant.px(), "URL cache hit");
        return Ok(ready_response(
            cached.url,
            cached.remaining_ttl.as_secs(),
            variant,
            &resolved.content_version,
        ));
    }

    match state.issuer.issue(user.0, &resolved, variant).await {
        Ok(IssueOutcome::Ready(issued)) => {
            state.url_cache.insert(&cache_key, issued.url.clone()).await;
            Ok(ready_response(
                issued.url,
                issued.ttl.as_secs(),
                variant,
                &resolved.content_version,
            ))
        }
        Ok(IssueOutcome::Missing { missing_variants }) => {
            Ok(enqueue_or_join(&state, user.0, &resolved, variant, missing_variants).await)
        }
        // A probe or signing failure is treated as a missing object: the
        // reader gets the queued path instead of an error.
        Err(AppError::Storage(e)) => {
            tracing::warn!(
                document_id = %document_id,
                variant = variant.px(),
                error = %e,
                "Issuance failed, falling back to render queue"
            );
            let all = state.config.thumbnail_variants().to_vec();
            Ok(enqueue_or_join(&state, user.0, &resolved, variant, all).await)
        }
        Err(other) => Err(other.into()),
    }
}

/// Queue a render for the group, or join the one already in flight.
///
/// Exactly one concurrent reader per (document, content version) wins the
/// coalescing mark and enqueues; the rest report the winner's job id.
async fn enqueue_or_join(
    state: &AppState,
    user_id: Uuid,
    resolved: &ResolvedDocument,
    requested: Variant,
    missing_variants: Vec<Variant>,
) -> Response {
    let document_id = resolved.document.id;
    let variants = if missing_variants.is_empty() {
        vec![requested]
    } else {
        missing_variants
    };
    let group_key = keys::render_group_key(document_id, &resolved.content_version);

    if state.coalescing.mark_if_free(&group_key).await {
        let request = JobRequest {
            document_id,
            content_version: resolved.content_version.clone(),
            variants,
            mime_type: resolved.document.mime_type.clone(),
            user_id,
            household_id: resolved.document.household_id,
        };
        match state.job_queue.enqueue(request).await {
            Ok(job) => queued_response(
                QUEUED_RETRY_HINT_MS,
                Some(job.id),
                Some(resolved.content_version.clone()),
            ),
            Err(e) => {
                // The mark must not outlive a job that never entered the
                // queue, or readers would wait out the full ceiling.
                state.coalescing.clear(&group_key).await;
                tracing::warn!(
                    document_id = %document_id,
                    error = %e,
                    "Render queue rejected job, asking client to retry"
                );
                queued_response(
                    QUEUE_FULL_RETRY_HINT_MS,
                    None,
                    Some(resolved.content_version.clone()),
                )
            }
        }
    } else {
        let job_id = state
            .job_queue
            .store()
            .active_job_for(document_id, &resolved.content_version)
            .await;
        tracing::debug!(
            document_id = %document_id,
            job_id = ?job_id,
            "Joined in-flight render"
        );
        queued_response(
            QUEUED_RETRY_HINT_MS,
            job_id,
            Some(resolved.content_version.clone()),
        )
    }
}

/// Explicitly re-render thumbnails for a document.
///
/// Always enqueues regardless of existing objects or cache entries, so a
/// corrupted render can be replaced without waiting for TTLs.
#[utoipa::path(
    post,
    path = "/api/v0/thumbnails",
    tag = "thumbnails",
    request_body = RegenerateRequest,
    params(
        ("x-user-id" = String, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 202, description = "Regeneration queued", body = RegenerateResponse),
        (status = 400, description = "Invalid document id, unsupported variant, or missing source hash", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not read this document", body = crate::error::ErrorResponse),
        (status = 404, description = "Document does not exist", body = crate::error::ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, body), fields(user_id = %user.0))]
pub async fn regenerate_thumbnails(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(body): ValidatedJson<RegenerateRequest>,
) -> Result<Response, HttpAppError> {
    let document_id = parse_document_id(&body.document_id)?;
    let variants = if body.variants.is_empty() {
        state.config.thumbnail_variants().to_vec()
    } else {
        body.variants
            .iter()
            .map(|&px| Variant::try_from(px).map_err(AppError::InvalidVariant))
            .collect::<Result<Vec<_>, _>>()?
    };

    if !state.rate_limiter.try_acquire(user.0).await {
        let retry = state.rate_limiter.retry_after(user.0).await;
        let retry_ms = (retry.as_millis() as u64).max(1);
        return Ok(queued_response(retry_ms, None, None));
    }

    let resolved = state.issuer.resolve_document(user.0, document_id).await?;

    // Regeneration keys objects by content version; without the canonical
    // hash a re-render would silently multiply derived-version objects.
    if resolved.fallback_version {
        return Err(AppError::MissingSourceHash(format!(
            "Document {} has no canonical source hash; regeneration requires one",
            document_id
        ))
        .into());
    }

    let group_key = keys::render_group_key(document_id, &resolved.content_version);
    let marked = state.coalescing.mark_if_free(&group_key).await;

    let request = JobRequest {
        document_id,
        content_version: resolved.content_version.clone(),
        variants: variants.clone(),
        mime_type: resolved.document.mime_type.clone(),
        user_id: user.0,
        household_id: resolved.document.household_id,
    };
    match state.job_queue.enqueue(request).await {
        Ok(job) => Ok((
            StatusCode::ACCEPTED,
            Json(RegenerateResponse {
                status: "queued".to_string(),
                job_id: job.id,
                variants: variants.iter().map(|v| v.px()).collect(),
            }),
        )
            .into_response()),
        Err(e) => {
            if marked {
                state.coalescing.clear(&group_key).await;
            }
            tracing::warn!(
                document_id = %document_id,
                error = %e,
                "Render queue rejected regeneration, asking client to retry"
            );
            Ok(queued_response(
                QUEUE_FULL_RETRY_HINT_MS,
                None,
                Some(resolved.content_version),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variant_accepts_supported_sizes() {
        assert_eq!(parse_variant(Some("96")).unwrap(), Variant::Px96);
        assert_eq!(parse_variant(Some("240")).unwrap(), Variant::Px240);
        assert_eq!(parse_variant(Some("480")).unwrap(), Variant::Px480);
    }

    #[test]
    fn test_parse_variant_rejects_garbage() {
        for raw in [Some("97"), Some("big"), Some("-1"), None] {
            let err = parse_variant(raw).unwrap_err();
            assert!(matches!(err, AppError::InvalidVariant(_)));
        }
    }

    #[test]
    fn test_parse_document_id_rejects_non_uuid() {
        let err = parse_document_id("doc-1").unwrap_err();
        assert!(matches!(err, AppError::InvalidDocumentId(_)));
        assert!(parse_document_id(&Uuid::new_v4().to_string()).is_ok());
    }

    #[test]
    fn test_queued_body_omits_absent_fields() {
        let body = ThumbnailQueuedResponse {
            status: "queued".to_string(),
            retry_after_ms: 500,
            job_id: None,
            source_hash: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json.get("retryAfterMs").and_then(|v| v.as_u64()), Some(500));
        assert!(json.get("jobId").is_none());
        assert!(json.get("sourceHash").is_none());
    }
}
