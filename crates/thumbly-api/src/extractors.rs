//! Request extractors.
//!
//! Authentication is owned by the platform gateway, which injects the
//! caller's identity as a header. This subsystem only reads it; a missing or
//! malformed header is a 401 rather than a guess.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::constants::USER_ID_HEADER;
use crate::error::ErrorResponse;

/// The authenticated caller, taken from the `x-user-id` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[derive(Debug)]
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "Missing or invalid x-user-id header",
                "UNAUTHENTICATED",
            )),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or(AuthRejection)?;
        Ok(AuthUser(user_id))
    }
}
