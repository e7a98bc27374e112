//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use thumbly_core::Config;
use thumbly_services::{
    AccessChecker, AuditSink, CoalescingRegistry, DocumentProvider, ExistenceChecker,
    HouseholdProvider, RateLimiter, SignedUrlCache, SignedUrlIssuer, Storage,
};
use thumbly_worker::{JobQueue, JobQueueConfig, RenderWorker};

/// Everything a handler needs, wired once at startup.
///
/// The collaborator traits (documents, access, households, audit) are
/// injected so deployments can swap platform adapters without touching the
/// request path.
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub issuer: Arc<SignedUrlIssuer>,
    pub rate_limiter: RateLimiter,
    pub url_cache: SignedUrlCache,
    pub coalescing: CoalescingRegistry,
    pub job_queue: JobQueue,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        documents: Arc<dyn DocumentProvider>,
        access: Arc<dyn AccessChecker>,
        households: Arc<dyn HouseholdProvider>,
        audit: Arc<dyn AuditSink>,
        worker: Arc<dyn RenderWorker>,
    ) -> Self {
        let url_ttl = Duration::from_secs(config.signed_url_ttl_secs());
        // Cached URLs expire a margin before the provider grant so a client
        // never receives a URL about to go stale.
        let cache_ttl = Duration::from_secs(
            config
                .signed_url_ttl_secs()
                .saturating_sub(config.url_cache_ttl_margin_secs())
                .max(1),
        );

        let existence =
            ExistenceChecker::new(Arc::clone(&storage), config.thumbnail_variants().to_vec());
        let issuer = Arc::new(SignedUrlIssuer::new(
            documents,
            access,
            households,
            existence,
            Arc::clone(&storage),
            audit,
            url_ttl,
        ));

        let coalescing =
            CoalescingRegistry::new(Duration::from_secs(config.coalescing_ceiling_secs()));
        let job_queue = JobQueue::new(
            JobQueueConfig {
                queue_size: config.job_queue_size(),
                max_concurrent: config.job_max_concurrent(),
            },
            worker,
            coalescing.clone(),
        );
        let rate_limiter = RateLimiter::new(
            config.rate_limit_capacity(),
            config.rate_limit_refill_per_sec(),
        );
        let url_cache = SignedUrlCache::new(cache_ttl);

        Self {
            config,
            storage,
            issuer,
            rate_limiter,
            url_cache,
            coalescing,
            job_queue,
        }
    }
}

// Handlers hold the state behind Arc across awaits.
#[allow(dead_code)]
fn _assert_app_state_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppState>();
}
