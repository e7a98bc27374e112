//! Per-user request rate limiting

mod limiter;

pub use limiter::RateLimiter;
