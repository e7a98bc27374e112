use std::sync::Arc;
use thumbly_api::setup::{setup_routes, start_server};
use thumbly_api::state::AppState;
use thumbly_core::Config;
use thumbly_services::fakes::{AllowListAccess, InMemoryDocuments, StaticHouseholds};
use thumbly_services::{create_storage, TracingAuditSink};
use thumbly_worker::PlaceholderRenderWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    thumbly_infra::init_telemetry(config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;
    config.validate()?;

    let storage = create_storage(&config).await?;
    tracing::info!(backend = %storage.backend_type(), "Storage initialized");

    // Document, access, and household lookups run against in-process
    // providers until the host platform's adapters are wired in. Rendering
    // uses the placeholder worker; the real rasterizer plugs into the same
    // seam.
    let documents = Arc::new(InMemoryDocuments::new());
    let access = Arc::new(AllowListAccess::new());
    let households = Arc::new(StaticHouseholds::new());
    tracing::warn!("In-memory collaborator providers active; platform adapters not configured");

    let worker = Arc::new(PlaceholderRenderWorker::new(Arc::clone(&storage)));

    let state = Arc::new(AppState::new(
        config,
        storage,
        documents,
        access,
        households,
        Arc::new(TracingAuditSink),
        worker,
    ));

    let app = setup_routes(&state.config, state.clone()).await?;
    start_server(&state.config, app).await
}
