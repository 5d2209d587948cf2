//! Handle used by submission code to talk to a running pipeline.

use certificate_core::{CertificateJob, JobId, PipelineEvent};
use ractor::{Actor, ActorRef};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::coordinator::{Coordinator, CoordinatorArgs};
use crate::messages::{CoordinatorMessage, PipelineError, PipelineStats};
use crate::services::PipelineServices;
use crate::settings::PipelineSettings;

/// Cheap-to-clone handle to a running certificate pipeline.
#[derive(Clone)]
pub struct CertificatePipeline {
    coordinator: ActorRef<CoordinatorMessage>,
    event_tx: broadcast::Sender<PipelineEvent>,
}

impl std::fmt::Debug for CertificatePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificatePipeline")
            .field("coordinator", &self.coordinator.get_id())
            .finish()
    }
}

impl CertificatePipeline {
    /// Validate a job and hand it to the coordinator.
    ///
    /// Returns as soon as the job is queued; rendering happens in the background.
    pub fn submit(&self, job: CertificateJob) -> Result<JobId, PipelineError> {
        job.validate()?;
        let job_id = job.job_id;
        self.coordinator
            .send_message(CoordinatorMessage::Submit(Box::new(job)))
            .map_err(|e| PipelineError::Unavailable(e.to_string()))?;
        Ok(job_id)
    }

    /// Subscribe to pipeline events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.event_tx.subscribe()
    }

    pub async fn stats(&self) -> Result<PipelineStats, PipelineError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.coordinator
            .send_message(CoordinatorMessage::GetStats { reply: tx.into() })
            .map_err(|e| PipelineError::Unavailable(e.to_string()))?;
        rx.await
            .map_err(|_| PipelineError::Unavailable("coordinator dropped the request".into()))
    }

    /// Stop both workers and the coordinator. Queued jobs are dropped.
    pub fn shutdown(&self) -> Result<(), PipelineError> {
        self.coordinator
            .send_message(CoordinatorMessage::Shutdown)
            .map_err(|e| PipelineError::Unavailable(e.to_string()))
    }

    pub fn coordinator(&self) -> &ActorRef<CoordinatorMessage> {
        &self.coordinator
    }
}

/// Start the coordinator and both workers.
pub async fn start_pipeline(
    services: PipelineServices,
    settings: PipelineSettings,
) -> Result<(CertificatePipeline, JoinHandle<()>), PipelineError> {
    let (event_tx, _) = broadcast::channel(1024);
    let args = CoordinatorArgs {
        services,
        settings,
        event_tx: event_tx.clone(),
    };

    let (coordinator, handle) = Actor::spawn(None, Coordinator, args).await?;

    Ok((
        CertificatePipeline {
            coordinator,
            event_tx,
        },
        handle,
    ))
}
