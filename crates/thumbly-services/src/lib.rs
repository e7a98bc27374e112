//! Thumbly Services Layer
//!
//! This crate is the **business service layer**: it hosts the signed-URL
//! issuance flow, existence probing, and the seams to external collaborators
//! (document repository, authorization, household directory, audit pipeline),
//! and re-exports a unified API from infrastructure and storage so that the
//! API crate depends on a single service facade. Keep business logic and
//! coordination here; keep thin HTTP handling in thumbly-api.

pub mod existence;
pub mod external;
pub mod fakes;
pub mod issuer;

pub use existence::ExistenceChecker;
pub use external::{
    AccessChecker, AuditSink, DocumentProvider, HouseholdProvider, ThumbnailAccessEvent,
    TracingAuditSink,
};
pub use issuer::{IssueOutcome, IssuedUrl, ResolvedDocument, SignedUrlIssuer};

pub use thumbly_infra::{CoalescingRegistry, RateLimiter, SignedUrlCache};
pub use thumbly_storage::{
    create_storage, keys, Storage, StorageBackend, StorageError, StorageResult,
};
