//! Render worker: HTML → PDF → object storage → notification email.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use certificate_core::{
    ArtifactLocation, CertificateDetails, CertificateJob, PipelineEvent, RenderResult,
    RenderStage, WorkerKind, certificate_email, certificate_html, certificate_key,
};
use chrono::Utc;
use futures_util::FutureExt;
use mailer::Email;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use render::RenderError;
use tokio::sync::broadcast;

use crate::messages::{CoordinatorMessage, PipelineError, RenderMessage, panic_message};
use crate::services::PipelineServices;

/// State for the render worker.
pub struct RenderWorkerState {
    pub services: PipelineServices,
    pub coordinator: ActorRef<CoordinatorMessage>,
    pub event_tx: broadcast::Sender<PipelineEvent>,
    pub render_timeout: Duration,
    /// Step the current job is in.
    pub stage: RenderStage,
}

impl RenderWorkerState {
    fn enter(&mut self, job: &CertificateJob, stage: RenderStage) {
        tracing::debug!(
            job_id = %job.job_id,
            "Render worker: {} -> {}",
            self.stage,
            stage
        );
        self.stage = stage;
        if stage != RenderStage::Idle {
            let _ = self.event_tx.send(PipelineEvent::StageEntered {
                job_id: job.job_id,
                worker: WorkerKind::Render,
                stage,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Render worker arguments.
#[derive(Clone)]
pub struct RenderWorkerArgs {
    pub services: PipelineServices,
    pub coordinator: ActorRef<CoordinatorMessage>,
    pub event_tx: broadcast::Sender<PipelineEvent>,
    pub render_timeout: Duration,
}

/// Worker actor that produces and announces certificates.
pub struct RenderWorker;

impl Actor for RenderWorker {
    type Msg = RenderMessage;
    type State = RenderWorkerState;
    type Arguments = RenderWorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting render worker");

        Ok(RenderWorkerState {
            services: args.services,
            coordinator: args.coordinator,
            event_tx: args.event_tx,
            render_timeout: args.render_timeout,
            stage: RenderStage::Idle,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            RenderMessage::Render(job) => {
                let job = *job;
                tracing::info!(
                    job_id = %job.job_id,
                    student_id = %job.student_id,
                    quiz_id = %job.quiz_id,
                    "Generating certificate for {}",
                    job.student_name
                );

                // A panicking job still gets a result; the worker stays up
                let outcome = AssertUnwindSafe(produce_certificate(&job, state))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(payload))));

                let result = match outcome {
                    Ok(artifact) => RenderResult::done(
                        job.job_id,
                        job.student_id.clone(),
                        job.quiz_id.clone(),
                        artifact,
                    ),
                    Err(error) => {
                        let detail = match &error {
                            PipelineError::Panicked(_) => format!("{} {}", state.stage, error),
                            _ => format!("{} failed: {}", state.stage, error),
                        };
                        tracing::warn!(job_id = %job.job_id, "{}", detail);
                        RenderResult::error(
                            job.job_id,
                            job.student_id.clone(),
                            job.quiz_id.clone(),
                            detail,
                        )
                    }
                };

                state.enter(&job, RenderStage::Reporting);
                state
                    .coordinator
                    .send_message(CoordinatorMessage::RenderFinished(result))?;
                state.enter(&job, RenderStage::Idle);
            }
        }

        Ok(())
    }
}

/// Run one job through render, upload and notify.
///
/// Leaves `state.stage` on the step that failed.
async fn produce_certificate(
    job: &CertificateJob,
    state: &mut RenderWorkerState,
) -> Result<ArtifactLocation, PipelineError> {
    state.enter(job, RenderStage::Rendering);
    let html = certificate_html(&CertificateDetails::from(job));
    let pdf = tokio::time::timeout(
        state.render_timeout,
        state.services.renderer.render_pdf(&html),
    )
    .await
    .map_err(|_| RenderError::Timeout {
        stage: "certificate render",
        after: state.render_timeout,
    })??;

    state.enter(job, RenderStage::Uploading);
    let key = certificate_key(&job.quiz_title, &job.team_name, &job.student_name);
    let artifact = state.services.store.put_pdf(&key, pdf).await?;
    tracing::debug!(job_id = %job.job_id, "Uploaded certificate to {}", artifact.url);

    state.enter(job, RenderStage::Notifying);
    let content = certificate_email(&job.student_name, &job.quiz_title, &artifact.url);
    let email = Email::new(job.student_email.clone(), content.subject, content.html);
    if let Err(e) = state.services.mailer.send(&email).await {
        // The uploaded object stays where it is
        tracing::warn!(
            job_id = %job.job_id,
            "Certificate uploaded to {} but email failed",
            artifact.url
        );
        return Err(e.into());
    }

    Ok(artifact)
}
