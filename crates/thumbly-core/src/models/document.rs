use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-model of a document as exposed by the document store.
///
/// This subsystem never mutates documents; it only reads the fields needed to
/// derive thumbnail cache keys and enforce access control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub household_id: Option<Uuid>,
    pub mime_type: String,
    /// Path of the source object in the upstream store. Stable across
    /// metadata edits; used for the fallback content-version digest.
    pub storage_path: String,
    /// Canonical content version. Changes whenever the underlying bytes
    /// change. May be absent for legacy uploads.
    pub source_hash: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Household a user belongs to, as reported by the membership service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Household {
    pub id: Uuid,
    pub name: String,
}
