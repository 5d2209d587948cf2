//! Runs the certificate pipeline until Ctrl-C.

use std::process::ExitCode;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; real deployments set the environment directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (pipeline, handle) = match api::init_certificate_pipeline().await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!("Failed to start certificate pipeline: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Mirror pipeline events into the log
    let mut events = pipeline.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.job_id() {
                Some(job_id) => tracing::debug!(
                    target: "certificate_events",
                    job_id = %job_id,
                    "{}",
                    api::format_event(&event)
                ),
                None => tracing::debug!(target: "certificate_events", "{}", api::format_event(&event)),
            }
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!("Shutdown requested");
    if let Ok(stats) = pipeline.stats().await {
        tracing::info!(
            "Pipeline stats: submitted={} rendered={} render_failed={} persisted={} persist_failed={} restarts={}",
            stats.submitted,
            stats.rendered,
            stats.render_failed,
            stats.persisted,
            stats.persist_failed,
            stats.restarts
        );
    }
    api::shutdown_certificate_pipeline();

    if let Err(e) = handle.await {
        tracing::error!("Coordinator task ended abnormally: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
