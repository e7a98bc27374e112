//! External collaborator seams.
//!
//! The document repository, authorization service, household directory, and
//! audit pipeline live outside this subsystem. The control plane reaches
//! them through narrow async traits so production wiring and in-memory test
//! fakes are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thumbly_core::models::{Document, Household, Variant};
use uuid::Uuid;

#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Fetch a document's read model by id. `Ok(None)` means the document
    /// does not exist, as opposed to a lookup failure.
    async fn get_document(&self, document_id: Uuid) -> anyhow::Result<Option<Document>>;
}

#[async_trait]
pub trait AccessChecker: Send + Sync {
    /// Whether the user may read the document. Callers must treat `Err` as
    /// a denial: authorization fails closed.
    async fn can_access_document(&self, user_id: Uuid, document_id: Uuid)
        -> anyhow::Result<bool>;
}

#[async_trait]
pub trait HouseholdProvider: Send + Sync {
    async fn get_user_household(&self, user_id: Uuid) -> anyhow::Result<Option<Household>>;
}

/// A thumbnail read that was granted a signed URL.
#[derive(Debug, Clone)]
pub struct ThumbnailAccessEvent {
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub variant: Variant,
    pub content_version: String,
    pub household_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record a thumbnail access. Delivery is best-effort: the issuer runs
    /// this off the request path and drops failures after logging them.
    async fn record(&self, event: ThumbnailAccessEvent) -> anyhow::Result<()>;
}

/// Audit sink that emits structured log lines.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: ThumbnailAccessEvent) -> anyhow::Result<()> {
        tracing::info!(
            user_id = %event.user_id,
            document_id = %event.document_id,
            variant = %event.variant,
            content_version = %event.content_version,
            household_id = ?event.household_id,
            occurred_at = %event.occurred_at,
            "Thumbnail access granted"
        );
        Ok(())
    }
}
