//! Persistence worker: records generated certificates on the attempt row.

use std::panic::AssertUnwindSafe;

use certificate_core::{PersistenceJob, PersistenceResult, PipelineEvent, RenderStage, WorkerKind};
use chrono::Utc;
use futures_util::FutureExt;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::messages::{CoordinatorMessage, PersistenceMessage, panic_message};
use crate::services::PipelineServices;

/// State for the persistence worker.
pub struct PersistenceWorkerState {
    pub services: PipelineServices,
    pub coordinator: ActorRef<CoordinatorMessage>,
    pub event_tx: broadcast::Sender<PipelineEvent>,
    pub stage: RenderStage,
}

impl PersistenceWorkerState {
    fn enter(&mut self, job: &PersistenceJob, stage: RenderStage) {
        tracing::debug!(job_id = %job.job_id, "Persistence worker: {} -> {}", self.stage, stage);
        self.stage = stage;
        if stage != RenderStage::Idle {
            let _ = self.event_tx.send(PipelineEvent::StageEntered {
                job_id: job.job_id,
                worker: WorkerKind::Persistence,
                stage,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Persistence worker arguments.
#[derive(Clone)]
pub struct PersistenceWorkerArgs {
    pub services: PipelineServices,
    pub coordinator: ActorRef<CoordinatorMessage>,
    pub event_tx: broadcast::Sender<PipelineEvent>,
}

/// Worker actor that writes certificate status to the database.
pub struct PersistenceWorker;

impl Actor for PersistenceWorker {
    type Msg = PersistenceMessage;
    type State = PersistenceWorkerState;
    type Arguments = PersistenceWorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting persistence worker");

        Ok(PersistenceWorkerState {
            services: args.services,
            coordinator: args.coordinator,
            event_tx: args.event_tx,
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
            PersistenceMessage::Persist(job) => {
                state.enter(&job, RenderStage::Writing);

                let written = AssertUnwindSafe(state.services.attempts.mark_certificate_generated(
                    &job.student_id,
                    &job.quiz_id,
                    &job.artifact.url,
                ))
                .catch_unwind()
                .await;

                let result = match written {
                    Ok(Ok(())) => PersistenceResult::done(&job),
                    Ok(Err(e)) => PersistenceResult::error(&job, format!("writing failed: {e}")),
                    Err(payload) => {
                        let detail = format!("writing panicked: {}", panic_message(payload));
                        tracing::warn!(job_id = %job.job_id, "{}", detail);
                        PersistenceResult::error(&job, detail)
                    }
                };

                state.enter(&job, RenderStage::Reporting);
                state
                    .coordinator
                    .send_message(CoordinatorMessage::PersistenceFinished(result))?;
                state.enter(&job, RenderStage::Idle);
            }
        }

        Ok(())
    }
}
