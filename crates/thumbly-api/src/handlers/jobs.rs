//! Render job status handler.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thumbly_core::AppError;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::HttpAppError;
use crate::extractors::AuthUser;
use crate::handlers::thumbnails::{parse_variant, VariantQuery};
use crate::state::AppState;

/// Per-variant render progress for a job.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    /// One of "queued", "rendering", "done", "failed".
    pub status: String,
    pub document_id: Uuid,
    /// Edge size in pixels.
    pub variant: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Get the render status of one variant of a job.
#[utoipa::path(
    get,
    path = "/api/v0/thumbnails/job/{job_id}",
    tag = "jobs",
    params(
        ("job_id" = String, Path, description = "Render job id"),
        ("variant" = Option<String>, Query, description = "Edge size in pixels (96, 240 or 480)"),
        ("x-user-id" = String, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Job status for the requested variant", body = JobStatusResponse),
        (status = 400, description = "Unsupported variant", body = crate::error::ErrorResponse),
        (status = 404, description = "Job unknown, expired, or not covering the variant", body = crate::error::ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, query), fields(user_id = %_user.0))]
pub async fn get_job_status(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(job_id): Path<String>,
    Query(query): Query<VariantQuery>,
) -> Result<Response, HttpAppError> {
    let variant = parse_variant(query.variant.as_deref())?;

    // A malformed id names no job; it is the same 404 as an expired one so
    // clients cannot distinguish unknown ids from swept ones.
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|_| AppError::JobNotFound(format!("No such job: {}", job_id)))?;

    let job = state
        .job_queue
        .job(job_id)
        .await
        .ok_or_else(|| AppError::JobNotFound(format!("No such job: {}", job_id)))?;

    let variant_state = job.state_of(variant).ok_or_else(|| {
        AppError::JobNotFound(format!(
            "Job {} does not cover variant {}",
            job_id,
            variant.px()
        ))
    })?;

    Ok((
        StatusCode::OK,
        Json(JobStatusResponse {
            job_id,
            status: variant_state.status.to_string(),
            document_id: job.document_id,
            variant: variant.px(),
            error_code: variant_state.error_code.clone(),
            created_at: job.created_at,
            updated_at: variant_state.updated_at,
        }),
    )
        .into_response())
}
