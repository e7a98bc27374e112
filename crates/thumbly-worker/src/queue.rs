//! Bounded render job queue with an in-memory job store.
//!
//! Jobs are enqueued by id onto a bounded channel and picked up by a worker
//! pool capped with a semaphore. Each variant renders independently and
//! records its own status transition, so one failed size never blocks the
//! rest of the job. After every variant settles, the worker clears the
//! coalescing mark for the job's render group so readers can re-enter.

use std::collections::HashMap;
use std::sync::Arc;
use thumbly_core::models::{GenerationJob, JobRequest, VariantStatus};
use thumbly_infra::CoalescingRegistry;
use thumbly_storage::keys;
use tokio::sync::{mpsc, Mutex, Semaphore};
use uuid::Uuid;

use crate::render::RenderWorker;

/// Tuning knobs for the queue and its worker pool.
#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    /// Capacity of the bounded enqueue channel.
    pub queue_size: usize,
    /// Maximum number of jobs rendering at once.
    pub max_concurrent: usize,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            queue_size: 1000,
            max_concurrent: 4,
        }
    }
}

/// In-memory store of generation jobs keyed by job id.
///
/// Shared between the enqueue path, the worker pool, and the status
/// endpoint. Terminal jobs linger until `purge_finished` sweeps them.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<Mutex<HashMap<Uuid, GenerationJob>>>,
}

impl JobStore {
    pub async fn insert(&self, job: GenerationJob) {
        self.jobs.lock().await.insert(job.id, job);
    }

    pub async fn get(&self, job_id: Uuid) -> Option<GenerationJob> {
        self.jobs.lock().await.get(&job_id).cloned()
    }

    pub async fn remove(&self, job_id: Uuid) -> Option<GenerationJob> {
        self.jobs.lock().await.remove(&job_id)
    }

    pub async fn set_variant_status(
        &self,
        job_id: Uuid,
        variant: thumbly_core::models::Variant,
        status: VariantStatus,
        error_code: Option<String>,
    ) {
        if let Some(job) = self.jobs.lock().await.get_mut(&job_id) {
            job.set_variant_status(variant, status, error_code);
        }
    }

    /// Find the in-flight job for a render group, if any.
    ///
    /// Coalesce-losing readers use this to report the id of the job the
    /// winner already enqueued.
    pub async fn active_job_for(
        &self,
        document_id: Uuid,
        content_version: &str,
    ) -> Option<Uuid> {
        self.jobs
            .lock()
            .await
            .values()
            .find(|job| {
                !job.is_terminal()
                    && job.document_id == document_id
                    && job.content_version == content_version
            })
            .map(|job| job.id)
    }

    /// Drop terminal jobs last updated before the retention window.
    ///
    /// Returns the number of jobs removed.
    pub async fn purge_finished(&self, retention: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - retention;
        let mut jobs = self.jobs.lock().await;
        let before = jobs.len();
        jobs.retain(|_, job| !(job.is_terminal() && job.updated_at < cutoff));
        before - jobs.len()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

/// Bounded queue feeding the render worker pool.
pub struct JobQueue {
    tx: mpsc::Sender<Uuid>,
    store: JobStore,
}

impl JobQueue {
    /// Create the queue and spawn its worker pool.
    pub fn new(
        config: JobQueueConfig,
        worker: Arc<dyn RenderWorker>,
        coalescing: CoalescingRegistry,
    ) -> Self {
        let queue_size = config.queue_size.max(1);
        let (tx, rx) = mpsc::channel(queue_size);
        let store = JobStore::default();

        tracing::info!(
            queue_size = queue_size,
            max_concurrent = config.max_concurrent,
            "Render job queue started"
        );

        tokio::spawn(Self::worker_pool(
            rx,
            store.clone(),
            worker,
            coalescing,
            config.max_concurrent,
        ));

        Self { tx, store }
    }

    /// Create a queue whose jobs are accepted but never processed.
    ///
    /// The receiver is parked so enqueued ids sit in the channel, which
    /// keeps queued statuses and the queue-full path observable in tests.
    pub fn new_no_worker(config: JobQueueConfig) -> Self {
        let queue_size = config.queue_size.max(1);
        let (tx, rx) = mpsc::channel::<Uuid>(queue_size);
        let store = JobStore::default();

        tokio::spawn(async move {
            let _rx = rx;
            std::future::pending::<()>().await;
        });

        Self { tx, store }
    }

    /// Register a job and hand it to the worker pool.
    ///
    /// A full channel rejects the job rather than blocking the request
    /// path; the job record is rolled back so the status endpoint never
    /// reports a job that was never queued.
    pub async fn enqueue(&self, request: JobRequest) -> anyhow::Result<GenerationJob> {
        let job = GenerationJob::new(request);
        let job_id = job.id;
        self.store.insert(job.clone()).await;

        match self.tx.try_send(job_id) {
            Ok(()) => {
                tracing::info!(
                    job_id = %job_id,
                    document_id = %job.document_id,
                    variants = job.variants.len(),
                    "Render job enqueued"
                );
                Ok(job)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.store.remove(job_id).await;
                tracing::warn!(
                    job_id = %job_id,
                    document_id = %job.document_id,
                    "Render job queue is full, rejecting job"
                );
                Err(anyhow::anyhow!("Render job queue is full"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.store.remove(job_id).await;
                Err(anyhow::anyhow!("Render job queue is shut down"))
            }
        }
    }

    pub async fn job(&self, job_id: Uuid) -> Option<GenerationJob> {
        self.store.get(job_id).await
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    async fn worker_pool(
        mut rx: mpsc::Receiver<Uuid>,
        store: JobStore,
        worker: Arc<dyn RenderWorker>,
        coalescing: CoalescingRegistry,
        max_concurrent: usize,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

        while let Some(job_id) = rx.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let store = store.clone();
            let worker = worker.clone();
            let coalescing = coalescing.clone();

            tokio::spawn(async move {
                let _permit = permit;
                Self::process_job(job_id, store, worker, coalescing).await;
            });
        }

        tracing::info!("Render worker pool stopped");
    }

    #[tracing::instrument(skip(store, worker, coalescing))]
    async fn process_job(
        job_id: Uuid,
        store: JobStore,
        worker: Arc<dyn RenderWorker>,
        coalescing: CoalescingRegistry,
    ) {
        let Some(job) = store.get(job_id).await else {
            tracing::warn!(job_id = %job_id, "Job vanished before processing");
            return;
        };

        for &variant in &job.variants {
            store
                .set_variant_status(job_id, variant, VariantStatus::Rendering, None)
                .await;

            match worker.render(&job, variant).await {
                Ok(()) => {
                    tracing::debug!(
                        job_id = %job_id,
                        variant = variant.px(),
                        "Variant rendered"
                    );
                    store
                        .set_variant_status(job_id, variant, VariantStatus::Done, None)
                        .await;
                }
                Err(e) => {
                    tracing::error!(
                        job_id = %job_id,
                        variant = variant.px(),
                        error = %e,
                        "Variant render failed"
                    );
                    store
                        .set_variant_status(
                            job_id,
                            variant,
                            VariantStatus::Failed,
                            Some("RENDER_FAILED".to_string()),
                        )
                        .await;
                }
            }
        }

        let group_key = keys::render_group_key(job.document_id, &job.content_version);
        coalescing.clear(&group_key).await;

        tracing::info!(
            job_id = %job_id,
            document_id = %job.document_id,
            "Render job settled"
        );
    }
}

impl Clone for JobQueue {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            store: self.store.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::PlaceholderRenderWorker;
    use std::time::Duration;
    use tempfile::tempdir;
    use thumbly_core::models::Variant;
    use thumbly_storage::{LocalStorage, Storage};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    async fn storage(dir: &std::path::Path) -> Arc<dyn Storage> {
        Arc::new(
            LocalStorage::new(dir, "http://localhost:4000".to_string(), SECRET.to_vec())
                .await
                .unwrap(),
        )
    }

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

    async fn wait_terminal(queue: &JobQueue, job_id: Uuid) -> GenerationJob {
        for _ in 0..100 {
            if let Some(job) = queue.job(job_id).await {
                if job.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not settle in time", job_id);
    }

    #[tokio::test]
    async fn test_enqueue_renders_all_variants() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let worker = Arc::new(PlaceholderRenderWorker::new(storage.clone()));
        let coalescing = CoalescingRegistry::new(Duration::from_secs(60));
        let queue = JobQueue::new(JobQueueConfig::default(), worker, coalescing.clone());

        let request = request(vec![Variant::Px96, Variant::Px240]);
        let document_id = request.document_id;
        let group_key = keys::render_group_key(document_id, "h1");
        assert!(coalescing.mark_if_free(&group_key).await);

        let job = queue.enqueue(request).await.unwrap();
        let settled = wait_terminal(&queue, job.id).await;

        for variant in [Variant::Px96, Variant::Px240] {
            let state = settled.state_of(variant).unwrap();
            assert_eq!(state.status, VariantStatus::Done);
            let key = keys::thumbnail_key(document_id, "h1", variant);
            assert!(storage.exists(&key).await.unwrap());
        }
        assert!(!coalescing.is_marked(&group_key).await);
    }

    #[tokio::test]
    async fn test_partial_failure_settles_remaining_variants() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let worker = Arc::new(PlaceholderRenderWorker::with_failures(
            storage.clone(),
            vec![Variant::Px480],
        ));
        let coalescing = CoalescingRegistry::new(Duration::from_secs(60));
        let queue = JobQueue::new(JobQueueConfig::default(), worker, coalescing);

        let job = queue
            .enqueue(request(vec![Variant::Px96, Variant::Px240, Variant::Px480]))
            .await
            .unwrap();
        let settled = wait_terminal(&queue, job.id).await;

        assert_eq!(
            settled.state_of(Variant::Px96).unwrap().status,
            VariantStatus::Done
        );
        assert_eq!(
            settled.state_of(Variant::Px240).unwrap().status,
            VariantStatus::Done
        );

        let failed = settled.state_of(Variant::Px480).unwrap();
        assert_eq!(failed.status, VariantStatus::Failed);
        assert_eq!(failed.error_code.as_deref(), Some("RENDER_FAILED"));
    }

    #[tokio::test]
    async fn test_no_worker_queue_keeps_jobs_queued() {
        let queue = JobQueue::new_no_worker(JobQueueConfig::default());
        let job = queue.enqueue(request(vec![Variant::Px96])).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let stored = queue.job(job.id).await.unwrap();
        assert_eq!(
            stored.state_of(Variant::Px96).unwrap().status,
            VariantStatus::Queued
        );
        assert!(!stored.is_terminal());
    }

    #[tokio::test]
    async fn test_full_queue_rejects_and_rolls_back() {
        let queue = JobQueue::new_no_worker(JobQueueConfig {
            queue_size: 1,
            max_concurrent: 1,
        });

        queue.enqueue(request(vec![Variant::Px96])).await.unwrap();

        let rejected = queue.enqueue(request(vec![Variant::Px96])).await;
        assert!(rejected.is_err());
        assert_eq!(queue.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_active_job_for_matches_render_group() {
        let queue = JobQueue::new_no_worker(JobQueueConfig::default());
        let request = request(vec![Variant::Px240]);
        let document_id = request.document_id;
        let job = queue.enqueue(request).await.unwrap();

        assert_eq!(
            queue.store().active_job_for(document_id, "h1").await,
            Some(job.id)
        );
        assert_eq!(queue.store().active_job_for(document_id, "h2").await, None);
        assert_eq!(
            queue.store().active_job_for(Uuid::new_v4(), "h1").await,
            None
        );

        queue
            .store()
            .set_variant_status(job.id, Variant::Px240, VariantStatus::Done, None)
            .await;
        assert_eq!(queue.store().active_job_for(document_id, "h1").await, None);
    }

    #[tokio::test]
    async fn test_purge_finished_drops_only_old_terminal_jobs() {
        let store = JobStore::default();

        let mut terminal = GenerationJob::new(request(vec![Variant::Px96]));
        terminal.set_variant_status(Variant::Px96, VariantStatus::Done, None);
        terminal.updated_at = chrono::Utc::now() - chrono::Duration::hours(2);
        let terminal_id = terminal.id;

        let active = GenerationJob::new(request(vec![Variant::Px96]));
        let active_id = active.id;

        store.insert(terminal).await;
        store.insert(active).await;

        let removed = store.purge_finished(chrono::Duration::hours(1)).await;
        assert_eq!(removed, 1);
        assert!(store.get(terminal_id).await.is_none());
        assert!(store.get(active_id).await.is_some());
    }
}
