//! API-wide constants.

/// Prefix for all versioned API routes.
pub const API_PREFIX: &str = "/api/v0";

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Retry hint returned with a queued response when a render job is in
/// flight. Rendering a full variant set typically finishes within a couple
/// of seconds, so clients polling at this cadence usually hit ready on the
/// first retry.
pub const QUEUED_RETRY_HINT_MS: u64 = 2000;

/// Retry hint returned when the render queue itself is saturated.
pub const QUEUE_FULL_RETRY_HINT_MS: u64 = 10_000;
