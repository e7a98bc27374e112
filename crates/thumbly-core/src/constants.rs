//! Shared constants used across Thumbly crates.

/// File extension of rendered thumbnail objects.
pub const THUMBNAIL_EXT: &str = "webp";

/// Number of hex characters kept from the fallback content-version digest.
pub const FALLBACK_VERSION_LEN: usize = 16;

/// Prefix under which all thumbnail objects live in storage.
pub const THUMBNAIL_KEY_PREFIX: &str = "thumbnails";
