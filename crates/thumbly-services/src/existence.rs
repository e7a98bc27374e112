//! Thumbnail existence probing and variant warming support.

use std::sync::Arc;
use thumbly_core::models::Variant;
use thumbly_storage::{keys, Storage, StorageResult};
use uuid::Uuid;

/// Probes storage for rendered thumbnail objects.
///
/// Holds the configured variant set so a single missing variant can be
/// expanded into the full list of gaps for warming.
#[derive(Clone)]
pub struct ExistenceChecker {
    storage: Arc<dyn Storage>,
    variants: Vec<Variant>,
}

impl ExistenceChecker {
    pub fn new(storage: Arc<dyn Storage>, variants: Vec<Variant>) -> Self {
        Self { storage, variants }
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// HEAD-equivalent probe for a single variant.
    #[tracing::instrument(skip(self))]
    pub async fn exists(
        &self,
        document_id: Uuid,
        content_version: &str,
        variant: Variant,
    ) -> StorageResult<bool> {
        let key = keys::thumbnail_key(document_id, content_version, variant);
        self.storage.exists(&key).await
    }

    /// All configured variants not yet rendered for this content version.
    ///
    /// The first reader to find any gap warms the full set, so the renderer
    /// is handed every missing variant at once rather than one per request.
    #[tracing::instrument(skip(self))]
    pub async fn missing_variants(
        &self,
        document_id: Uuid,
        content_version: &str,
    ) -> StorageResult<Vec<Variant>> {
        let mut missing = Vec::new();
        for &variant in &self.variants {
            if !self.exists(document_id, content_version, variant).await? {
                missing.push(variant);
            }
        }
        Ok(missing)
    }
}
