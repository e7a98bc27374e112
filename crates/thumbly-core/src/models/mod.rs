pub mod document;
pub mod job;
pub mod variant;

pub use document::{Document, Household};
pub use job::{GenerationJob, JobRequest, VariantState, VariantStatus};
pub use variant::Variant;
