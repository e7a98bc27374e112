//! Thumbly Infrastructure Library
//!
//! This crate provides shared infrastructure components used across the
//! Thumbly services:
//! - Middleware (request ID, security headers)
//! - Telemetry initialization
//! - Per-user rate limiting
//! - Signed-URL caching
//! - Render coalescing

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

#[cfg(feature = "url-cache")]
pub mod url_cache;

#[cfg(feature = "coalescing")]
pub mod coalescing;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{
    get_request_id, request_id_middleware, security_headers_middleware, RequestId,
};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

#[cfg(feature = "rate-limit")]
pub use rate_limit::RateLimiter;

#[cfg(feature = "url-cache")]
pub use url_cache::SignedUrlCache;

#[cfg(feature = "coalescing")]
pub use coalescing::CoalescingRegistry;
