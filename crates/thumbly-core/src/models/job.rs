use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Variant;

/// Per-variant rendering status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    Queued,
    Rendering,
    Done,
    Failed,
}

impl VariantStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VariantStatus::Done | VariantStatus::Failed)
    }
}

impl Display for VariantStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VariantStatus::Queued => write!(f, "queued"),
            VariantStatus::Rendering => write!(f, "rendering"),
            VariantStatus::Done => write!(f, "done"),
            VariantStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for VariantStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(VariantStatus::Queued),
            "rendering" => Ok(VariantStatus::Rendering),
            "done" => Ok(VariantStatus::Done),
            "failed" => Ok(VariantStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid variant status: {}", s)),
        }
    }
}

/// Tracking record for one variant within a generation job.
#[derive(Debug, Clone)]
pub struct VariantState {
    pub status: VariantStatus,
    pub error_code: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl VariantState {
    fn queued() -> Self {
        Self {
            status: VariantStatus::Queued,
            error_code: None,
            updated_at: Utc::now(),
        }
    }
}

/// Payload accepted by the job queue when enqueueing generation work.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub document_id: Uuid,
    pub content_version: String,
    pub variants: Vec<Variant>,
    pub mime_type: String,
    pub user_id: Uuid,
    pub household_id: Option<Uuid>,
}

/// A generation job: one rendering-worker invocation covering one or more
/// variants of a single (document, content version) pair.
///
/// Variants complete independently; a failed variant never blocks its
/// siblings, and the job is terminal once every variant is `done` or
/// `failed`.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content_version: String,
    pub variants: Vec<Variant>,
    pub states: HashMap<Variant, VariantState>,
    pub mime_type: String,
    pub user_id: Uuid,
    pub household_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(request: JobRequest) -> Self {
        let now = Utc::now();
        let states = request
            .variants
            .iter()
            .map(|v| (*v, VariantState::queued()))
            .collect();
        Self {
            id: Uuid::new_v4(),
            document_id: request.document_id,
            content_version: request.content_version,
            variants: request.variants,
            states,
            mime_type: request.mime_type,
            user_id: request.user_id,
            household_id: request.household_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a status transition for one variant. Unknown variants are
    /// ignored so a stale worker callback cannot widen the job.
    pub fn set_variant_status(
        &mut self,
        variant: Variant,
        status: VariantStatus,
        error_code: Option<String>,
    ) {
        if let Some(state) = self.states.get_mut(&variant) {
            let now = Utc::now();
            state.status = status;
            state.error_code = error_code;
            state.updated_at = now;
            self.updated_at = now;
        }
    }

    pub fn state_of(&self, variant: Variant) -> Option<&VariantState> {
        self.states.get(&variant)
    }

    /// True once every requested variant has reached `done` or `failed`.
    pub fn is_terminal(&self) -> bool {
        self.states.values().all(|s| s.status.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(variants: Vec<Variant>) -> JobRequest {
        JobRequest {
            document_id: Uuid::new_v4(),
            content_version: "h1".to_string(),
            variants,
            mime_type: "application/pdf".to_string(),
            user_id: Uuid::new_v4(),
            household_id: None,
        }
    }

    #[test]
    fn test_new_job_starts_queued() {
        let job = GenerationJob::new(request(vec![Variant::Px96, Variant::Px240]));
        assert_eq!(job.variants.len(), 2);
        assert!(job
            .states
            .values()
            .all(|s| s.status == VariantStatus::Queued));
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_partial_failure_is_not_terminal_until_all_settle() {
        let mut job = GenerationJob::new(request(vec![Variant::Px96, Variant::Px240]));

        job.set_variant_status(
            Variant::Px96,
            VariantStatus::Failed,
            Some("RENDER_ERROR".to_string()),
        );
        assert!(!job.is_terminal());

        job.set_variant_status(Variant::Px240, VariantStatus::Done, None);
        assert!(job.is_terminal());

        let failed = job.state_of(Variant::Px96).unwrap();
        assert_eq!(failed.status, VariantStatus::Failed);
        assert_eq!(failed.error_code.as_deref(), Some("RENDER_ERROR"));

        let done = job.state_of(Variant::Px240).unwrap();
        assert_eq!(done.status, VariantStatus::Done);
        assert!(done.error_code.is_none());
    }

    #[test]
    fn test_unknown_variant_callback_ignored() {
        let mut job = GenerationJob::new(request(vec![Variant::Px96]));
        job.set_variant_status(Variant::Px480, VariantStatus::Done, None);
        assert!(job.state_of(Variant::Px480).is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_variant_status_round_trip() {
        for status in [
            VariantStatus::Queued,
            VariantStatus::Rendering,
            VariantStatus::Done,
            VariantStatus::Failed,
        ] {
            assert_eq!(
                status.to_string().parse::<VariantStatus>().unwrap(),
                status
            );
        }
        assert!("cancelled".parse::<VariantStatus>().is_err());
    }
}
