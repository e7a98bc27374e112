//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;

/// Returns the OpenAPI spec served at `/api/openapi.json`.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Thumbly API",
        version = "0.1.0",
        description = "Thumbnail generation and delivery control plane. Issues short-lived signed URLs for rendered thumbnails and queues renders for missing ones. All endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::thumbnails::get_thumbnail,
        handlers::thumbnails::regenerate_thumbnails,
        handlers::jobs::get_job_status,
    ),
    components(schemas(
        handlers::thumbnails::ThumbnailReadyResponse,
        handlers::thumbnails::ThumbnailQueuedResponse,
        handlers::thumbnails::RegenerateRequest,
        handlers::thumbnails::RegenerateResponse,
        handlers::jobs::JobStatusResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "thumbnails", description = "Thumbnail delivery and regeneration"),
        (name = "jobs", description = "Render job status")
    )
)]
pub struct ApiDoc;
