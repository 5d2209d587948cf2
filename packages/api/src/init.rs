//! Server initialization for the certificate pipeline.

use actors::{
    CertificatePipeline, PipelineError, PipelineServices, PipelineSettings, global_registry,
    start_pipeline,
};
use db::repositories::ParticipationRepository;
use db::{DbConfig, init as init_db};
use mailer::Mailer;
use render::{ChromiumRenderer, RendererConfig};
use storage::Storage;
use tokio::task::JoinHandle;

/// Initialize the certificate pipeline from environment variables.
///
/// This should be called once at server startup before handling requests.
/// The storage, mail and database handles are built here and shared by the
/// workers for the life of the process.
pub async fn init_certificate_pipeline()
-> Result<(CertificatePipeline, JoinHandle<()>), PipelineError> {
    tracing::info!("Initializing certificate pipeline...");

    let database = init_db(&DbConfig::from_env()).await?;

    let storage = Storage::from_env().await?;
    tracing::info!("Certificate storage backend: {}", storage.kind_str());

    let mailer = Mailer::from_env()?;
    tracing::info!(
        "Mail backend: {} (from {})",
        mailer.kind().as_str(),
        mailer.from_address()
    );

    let renderer = ChromiumRenderer::new(RendererConfig::from_env()?);
    let settings = PipelineSettings::from_env()?;

    let services = PipelineServices::new(
        renderer,
        storage,
        mailer,
        ParticipationRepository::new(database),
    );
    let (pipeline, handle) = start_pipeline(services, settings).await?;

    // Register globally
    if let Err(e) = global_registry().register(pipeline.clone()) {
        let _ = pipeline.shutdown();
        return Err(e);
    }

    tracing::info!("Certificate pipeline initialized");
    Ok((pipeline, handle))
}
