//! Thumbly Worker Library
//!
//! Background rendering infrastructure: the bounded job queue, the in-memory
//! job store with per-variant statuses, and the `RenderWorker` seam the
//! actual rasterizer plugs into.

pub mod queue;
pub mod render;

pub use queue::{JobQueue, JobQueueConfig, JobStore};
pub use render::{PlaceholderRenderWorker, RenderWorker};
