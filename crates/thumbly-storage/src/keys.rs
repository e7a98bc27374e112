//! Shared key derivation for storage backends.
//!
//! Key format: `thumbnails/{document_id}/{content_version}/{px}.webp`.

use thumbly_core::constants::{THUMBNAIL_EXT, THUMBNAIL_KEY_PREFIX};
use thumbly_core::models::Variant;
use uuid::Uuid;

/// Derive the storage key for a rendered thumbnail.
///
/// The key is fully determined by (document, content version, variant), so
/// repeat requests and the rendering worker always agree on the object's
/// location. All backends must use this format for consistency.
pub fn thumbnail_key(document_id: Uuid, content_version: &str, variant: Variant) -> String {
    format!(
        "{}/{}/{}/{}.{}",
        THUMBNAIL_KEY_PREFIX,
        document_id,
        content_version,
        variant.px(),
        THUMBNAIL_EXT
    )
}

/// Coalescing key for a render group.
///
/// The request path marks this key before enqueueing and the worker clears
/// it after the job settles, so both sides must derive it identically.
pub fn render_group_key(document_id: Uuid, content_version: &str) -> String {
    format!("{}/{}/{}", THUMBNAIL_KEY_PREFIX, document_id, content_version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_key_is_deterministic() {
        let document_id = Uuid::new_v4();
        let a = thumbnail_key(document_id, "h1", Variant::Px240);
        let b = thumbnail_key(document_id, "h1", Variant::Px240);
        assert_eq!(a, b);
        assert_eq!(
            a,
            format!("thumbnails/{}/h1/240.webp", document_id)
        );
    }

    #[test]
    fn test_thumbnail_key_varies_with_inputs() {
        let document_id = Uuid::new_v4();
        let base = thumbnail_key(document_id, "h1", Variant::Px96);
        assert_ne!(base, thumbnail_key(document_id, "h2", Variant::Px96));
        assert_ne!(base, thumbnail_key(document_id, "h1", Variant::Px480));
        assert_ne!(base, thumbnail_key(Uuid::new_v4(), "h1", Variant::Px96));
    }

    #[test]
    fn test_render_group_key_is_variant_agnostic() {
        let document_id = Uuid::new_v4();
        let key = render_group_key(document_id, "h1");
        assert_eq!(key, format!("thumbnails/{}/h1", document_id));
        assert!(thumbnail_key(document_id, "h1", Variant::Px96).starts_with(&key));
        assert_ne!(key, render_group_key(document_id, "h2"));
    }
}
