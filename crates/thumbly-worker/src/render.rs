//! Render worker seam.
//!
//! The queue drives one `render` call per variant. Real deployments plug in
//! a rasterizing implementation; this crate ships a placeholder worker that
//! writes stand-in objects so the control plane can run end to end without
//! a pixel pipeline.

use async_trait::async_trait;
use std::sync::Arc;
use thumbly_core::models::{GenerationJob, Variant};
use thumbly_storage::{keys, Storage};

/// Renders a single thumbnail variant and persists it to storage.
#[async_trait]
pub trait RenderWorker: Send + Sync {
    async fn render(&self, job: &GenerationJob, variant: Variant) -> anyhow::Result<()>;
}

/// Render worker that uploads a small stand-in object per variant.
///
/// The payload is not a decodable image; it only occupies the object's key
/// so existence probes and signed URLs behave as they would in production.
pub struct PlaceholderRenderWorker {
    storage: Arc<dyn Storage>,
    fail_variants: Vec<Variant>,
}

impl PlaceholderRenderWorker {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            fail_variants: Vec::new(),
        }
    }

    /// Variant renders in `fail_variants` will error, for exercising the
    /// partial-success path.
    pub fn with_failures(storage: Arc<dyn Storage>, fail_variants: Vec<Variant>) -> Self {
        Self {
            storage,
            fail_variants,
        }
    }
}

#[async_trait]
impl RenderWorker for PlaceholderRenderWorker {
    async fn render(&self, job: &GenerationJob, variant: Variant) -> anyhow::Result<()> {
        if self.fail_variants.contains(&variant) {
            anyhow::bail!("render failed for {}px", variant.px());
        }

        let key = keys::thumbnail_key(job.document_id, &job.content_version, variant);
        let data = format!("placeholder thumbnail {}px", variant.px()).into_bytes();
        self.storage
            .upload_with_key(&key, data, "image/webp")
            .await
            .map_err(|e| anyhow::anyhow!("placeholder upload failed: {}", e))?;
        Ok(())
    }
}
