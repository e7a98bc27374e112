//! Thumbly Storage Library
//!
//! This crate provides the storage abstraction and implementations for
//! Thumbly. It includes the Storage trait and implementations for S3 and the
//! local filesystem.
//!
//! # Storage key format
//!
//! Thumbnail objects use a deterministic, content-addressed key layout shared
//! by all backends:
//!
//! - `thumbnails/{document_id}/{content_version}/{px}.webp`
//!
//! Keys must not contain `..` or a leading `/`. Key derivation is centralized
//! in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
pub mod url_token;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use thumbly_core::StorageBackend;
pub use traits::{Storage, StorageError, StorageResult};
