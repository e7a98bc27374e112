//! Signed-URL issuance.
//!
//! The flow is strictly ordered: authorization runs before any storage
//! interaction, the content version is pinned (falling back to a derived
//! surrogate when the canonical hash is absent), the object is probed, and
//! only then is a read URL signed. Audit recording happens off the request
//! path.

use crate::existence::ExistenceChecker;
use crate::external::{
    AccessChecker, AuditSink, DocumentProvider, HouseholdProvider, ThumbnailAccessEvent,
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thumbly_core::constants::FALLBACK_VERSION_LEN;
use thumbly_core::models::{Document, Variant};
use thumbly_core::AppError;
use thumbly_storage::{keys, Storage};
use uuid::Uuid;

/// A document resolved for thumbnail access: existence and read access
/// verified, content version pinned.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub document: Document,
    pub content_version: String,
    /// True when the content version is the derived surrogate rather than
    /// the canonical source hash.
    pub fallback_version: bool,
}

/// A time-limited read URL for a rendered thumbnail.
#[derive(Debug, Clone)]
pub struct IssuedUrl {
    pub url: String,
    pub ttl: Duration,
}

/// Outcome of an issuance attempt for an authorized request.
#[derive(Debug, Clone)]
pub enum IssueOutcome {
    /// The object exists; here is a signed read URL.
    Ready(IssuedUrl),
    /// The object is not rendered yet. Carries every variant gap for this
    /// content version so the caller can warm the full set.
    Missing { missing_variants: Vec<Variant> },
}

pub struct SignedUrlIssuer {
    documents: Arc<dyn DocumentProvider>,
    access: Arc<dyn AccessChecker>,
    households: Arc<dyn HouseholdProvider>,
    existence: ExistenceChecker,
    storage: Arc<dyn Storage>,
    audit: Arc<dyn AuditSink>,
    url_ttl: Duration,
}

impl SignedUrlIssuer {
    pub fn new(
        documents: Arc<dyn DocumentProvider>,
        access: Arc<dyn AccessChecker>,
        households: Arc<dyn HouseholdProvider>,
        existence: ExistenceChecker,
        storage: Arc<dyn Storage>,
        audit: Arc<dyn AuditSink>,
        url_ttl: Duration,
    ) -> Self {
        Self {
            documents,
            access,
            households,
            existence,
            storage,
            audit,
            url_ttl,
        }
    }

    pub fn url_ttl(&self) -> Duration {
        self.url_ttl
    }

    /// Deterministic surrogate content version for documents missing their
    /// canonical source hash. Same (storage path, modification marker)
    /// always yields the same version, so repeat requests and the renderer
    /// agree on object keys even in degraded mode.
    fn fallback_content_version(document: &Document) -> String {
        let mut hasher = Sha256::new();
        hasher.update(document.storage_path.as_bytes());
        hasher.update(b"|");
        hasher.update(document.updated_at.timestamp().to_be_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)[..FALLBACK_VERSION_LEN].to_string()
    }

    /// Fetch the document and verify read access.
    ///
    /// An access-check failure denies: authorization fails closed.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_document(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<ResolvedDocument, AppError> {
        let document = self
            .documents
            .get_document(document_id)
            .await
            .map_err(|e| AppError::InternalWithSource {
                message: "Document lookup failed".to_string(),
                source: e,
            })?
            .ok_or_else(|| {
                AppError::DocumentNotFound(format!("Document not found: {}", document_id))
            })?;

        let allowed = match self.access.can_access_document(user_id, document_id).await {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    document_id = %document_id,
                    error = %e,
                    "Access check failed, denying"
                );
                false
            }
        };
        if !allowed {
            return Err(AppError::AccessDenied(
                "You do not have read access to this document".to_string(),
            ));
        }

        let (content_version, fallback_version) = match document.source_hash {
            Some(ref hash) => (hash.clone(), false),
            None => {
                let surrogate = Self::fallback_content_version(&document);
                tracing::warn!(
                    document_id = %document_id,
                    degraded_mode = "content_version_fallback",
                    content_version = %surrogate,
                    "Document has no source hash, using derived content version"
                );
                (surrogate, true)
            }
        };

        Ok(ResolvedDocument {
            document,
            content_version,
            fallback_version,
        })
    }

    /// Probe for the rendered object and, when present, sign a read URL and
    /// record the access.
    #[tracing::instrument(skip(self, resolved), fields(document_id = %resolved.document.id))]
    pub async fn issue(
        &self,
        user_id: Uuid,
        resolved: &ResolvedDocument,
        variant: Variant,
    ) -> Result<IssueOutcome, AppError> {
        let document_id = resolved.document.id;

        let exists = self
            .existence
            .exists(document_id, &resolved.content_version, variant)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        if !exists {
            let missing = self
                .existence
                .missing_variants(document_id, &resolved.content_version)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
            return Ok(IssueOutcome::Missing {
                missing_variants: missing,
            });
        }

        let key = keys::thumbnail_key(document_id, &resolved.content_version, variant);
        let url = self
            .storage
            .get_presigned_url(&key, self.url_ttl)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        // Audit is best-effort and stays off the hot path.
        let audit = Arc::clone(&self.audit);
        let households = Arc::clone(&self.households);
        let content_version = resolved.content_version.clone();
        tokio::spawn(async move {
            let household_id = households
                .get_user_household(user_id)
                .await
                .ok()
                .flatten()
                .map(|h| h.id);
            let event = ThumbnailAccessEvent {
                user_id,
                document_id,
                variant,
                content_version,
                household_id,
                occurred_at: Utc::now(),
            };
            if let Err(e) = audit.record(event).await {
                tracing::debug!(error = %e, "Audit sink rejected thumbnail access event");
            }
        });

        Ok(IssueOutcome::Ready(IssuedUrl {
            url,
            ttl: self.url_ttl,
        }))
    }

    /// Full issuance flow: resolve, then probe and sign.
    pub async fn get_thumbnail_signed_url(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        variant: Variant,
    ) -> Result<IssueOutcome, AppError> {
        let resolved = self.resolve_document(user_id, document_id).await?;
        self.issue(user_id, &resolved, variant).await
    }
}
