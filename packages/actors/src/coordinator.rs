//! Coordinator actor: owns both workers and routes results between them.

use certificate_core::{
    PersistenceResult, PipelineEvent, RenderOutcome, RenderResult, WorkerKind,
};
use chrono::Utc;
use ractor::{Actor, ActorCell, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::sync::broadcast;

use crate::journal::{FailureJournal, FailureRecord};
use crate::messages::{CoordinatorMessage, PersistenceMessage, PipelineStats, RenderMessage};
use crate::persistence_worker::{PersistenceWorker, PersistenceWorkerArgs};
use crate::render_worker::{RenderWorker, RenderWorkerArgs};
use crate::services::PipelineServices;
use crate::settings::PipelineSettings;

/// State for the coordinator actor.
pub struct CoordinatorState {
    pub render: ActorRef<RenderMessage>,
    pub persistence: ActorRef<PersistenceMessage>,
    pub event_tx: broadcast::Sender<PipelineEvent>,
    pub stats: PipelineStats,
    render_args: RenderWorkerArgs,
    persistence_args: PersistenceWorkerArgs,
    journal: Option<FailureJournal>,
    restart_workers: bool,
    render_down: bool,
    persistence_down: bool,
    shutting_down: bool,
}

impl CoordinatorState {
    fn worker_kind(&self, cell: &ActorCell) -> Option<WorkerKind> {
        if cell.get_id() == self.render.get_id() {
            Some(WorkerKind::Render)
        } else if cell.get_id() == self.persistence.get_id() {
            Some(WorkerKind::Persistence)
        } else {
            None
        }
    }

    /// Count, log, journal and announce a render result, then hand successes on.
    async fn finish_render(&mut self, result: RenderResult) {
        match &result.outcome {
            RenderOutcome::Done { artifact } => {
                self.stats.rendered += 1;
                tracing::info!(
                    job_id = %result.job_id,
                    student_id = %result.student_id,
                    quiz_id = %result.quiz_id,
                    "Certificate delivered: {}",
                    artifact.url
                );
            }
            RenderOutcome::Error { error } => {
                self.stats.render_failed += 1;
                tracing::error!(
                    job_id = %result.job_id,
                    student_id = %result.student_id,
                    quiz_id = %result.quiz_id,
                    "Certificate generation failed: {}",
                    error
                );
                self.journal_failure(FailureRecord::from_render(&result)).await;
            }
        }

        let _ = self.event_tx.send(PipelineEvent::RenderFinished {
            result: result.clone(),
            timestamp: Utc::now(),
        });

        let Some(job) = result.into_persistence_job() else {
            return;
        };
        let scheduled = PipelineEvent::PersistenceScheduled {
            job_id: job.job_id,
            student_id: job.student_id.clone(),
            quiz_id: job.quiz_id.clone(),
            timestamp: Utc::now(),
        };
        let sent = if self.persistence_down {
            Err("worker is down".to_string())
        } else {
            self.persistence
                .send_message(PersistenceMessage::Persist(job.clone()))
                .map_err(|e| e.to_string())
        };
        match sent {
            Ok(()) => {
                let _ = self.event_tx.send(scheduled);
            }
            Err(e) => {
                let detail = format!("persistence worker unavailable: {e}");
                self.finish_persistence(PersistenceResult::error(&job, detail))
                    .await;
            }
        }
    }

    async fn finish_persistence(&mut self, result: PersistenceResult) {
        if result.is_done() {
            self.stats.persisted += 1;
            tracing::info!(
                job_id = %result.job_id,
                student_id = %result.student_id,
                quiz_id = %result.quiz_id,
                "Certificate status recorded"
            );
        } else {
            self.stats.persist_failed += 1;
            tracing::error!(
                job_id = %result.job_id,
                student_id = %result.student_id,
                quiz_id = %result.quiz_id,
                "Failed to record certificate status: {:?}",
                result.outcome
            );
            self.journal_failure(FailureRecord::from_persistence(&result))
                .await;
        }

        let _ = self.event_tx.send(PipelineEvent::PersistenceFinished {
            result,
            timestamp: Utc::now(),
        });
    }

    async fn journal_failure(&self, record: Option<FailureRecord>) {
        if let (Some(journal), Some(record)) = (&self.journal, record)
            && let Err(e) = journal.record(&record).await
        {
            tracing::warn!(job_id = %record.job_id, "Failed to journal failure: {}", e);
        }
    }
}

/// Coordinator actor arguments.
pub struct CoordinatorArgs {
    pub services: PipelineServices,
    pub settings: PipelineSettings,
    pub event_tx: broadcast::Sender<PipelineEvent>,
}

async fn spawn_render_worker(
    myself: &ActorRef<CoordinatorMessage>,
    args: RenderWorkerArgs,
) -> Result<ActorRef<RenderMessage>, ActorProcessingErr> {
    let (worker, _handle) = Actor::spawn_linked(None, RenderWorker, args, myself.get_cell())
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn render worker: {}", e)))?;
    Ok(worker)
}

async fn spawn_persistence_worker(
    myself: &ActorRef<CoordinatorMessage>,
    args: PersistenceWorkerArgs,
) -> Result<ActorRef<PersistenceMessage>, ActorProcessingErr> {
    let (worker, _handle) =
        Actor::spawn_linked(None, PersistenceWorker, args, myself.get_cell())
            .await
            .map_err(|e| {
                ActorProcessingErr::from(format!("Failed to spawn persistence worker: {}", e))
            })?;
    Ok(worker)
}

/// Supervisor of the render and persistence workers.
pub struct Coordinator;

impl Actor for Coordinator {
    type Msg = CoordinatorMessage;
    type State = CoordinatorState;
    type Arguments = CoordinatorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting certificate pipeline coordinator");

        let journal = match &args.settings.failure_journal_dir {
            Some(dir) => {
                let journal = FailureJournal::new(dir);
                journal.init().await?;
                tracing::info!("Journaling failures to {:?}", journal.base_dir());
                Some(journal)
            }
            None => None,
        };

        let render_args = RenderWorkerArgs {
            services: args.services.clone(),
            coordinator: myself.clone(),
            event_tx: args.event_tx.clone(),
            render_timeout: args.settings.render_timeout,
        };
        let persistence_args = PersistenceWorkerArgs {
            services: args.services,
            coordinator: myself.clone(),
            event_tx: args.event_tx.clone(),
        };

        let render = spawn_render_worker(&myself, render_args.clone()).await?;
        let persistence = spawn_persistence_worker(&myself, persistence_args.clone()).await?;

        Ok(CoordinatorState {
            render,
            persistence,
            event_tx: args.event_tx,
            stats: PipelineStats::default(),
            render_args,
            persistence_args,
            journal,
            restart_workers: args.settings.restart_workers,
            render_down: false,
            persistence_down: false,
            shutting_down: false,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            CoordinatorMessage::Submit(job) => {
                let (job_id, student_id, quiz_id) =
                    (job.job_id, job.student_id.clone(), job.quiz_id.clone());
                state.stats.submitted += 1;

                tracing::info!(
                    job_id = %job_id,
                    student_id = %student_id,
                    quiz_id = %quiz_id,
                    "Certificate job submitted"
                );
                let _ = state.event_tx.send(PipelineEvent::JobSubmitted {
                    job_id,
                    student_id: student_id.clone(),
                    quiz_id: quiz_id.clone(),
                    timestamp: Utc::now(),
                });

                let sent = if state.render_down {
                    Err("worker is down".to_string())
                } else {
                    state
                        .render
                        .send_message(RenderMessage::Render(job))
                        .map_err(|e| e.to_string())
                };
                if let Err(e) = sent {
                    let detail = format!("render worker unavailable: {e}");
                    let result = RenderResult::error(job_id, student_id, quiz_id, detail);
                    state.finish_render(result).await;
                }
            }

            CoordinatorMessage::RenderFinished(result) => {
                state.finish_render(result).await;
            }

            CoordinatorMessage::PersistenceFinished(result) => {
                state.finish_persistence(result).await;
            }

            CoordinatorMessage::GetStats { reply } => {
                let _ = reply.send(state.stats);
            }

            CoordinatorMessage::Shutdown => {
                tracing::info!("Shutting down certificate pipeline");
                state.shutting_down = true;
                state.render.stop(Some("shutdown".into()));
                state.persistence.stop(Some("shutdown".into()));
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let (cell, reason) = match message {
            SupervisionEvent::ActorFailed(cell, err) => (cell, err.to_string()),
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                (cell, reason.unwrap_or_else(|| "stopped".to_string()))
            }
            _ => return Ok(()),
        };

        if state.shutting_down {
            return Ok(());
        }
        let Some(worker) = state.worker_kind(&cell) else {
            return Ok(());
        };

        tracing::warn!("{} worker terminated: {}", worker, reason);
        if !state.restart_workers {
            // Later jobs for this worker get an error result instead
            tracing::error!("{} worker is down and restarts are disabled", worker);
            match worker {
                WorkerKind::Render => state.render_down = true,
                WorkerKind::Persistence => state.persistence_down = true,
            }
            return Ok(());
        }

        match worker {
            WorkerKind::Render => {
                state.render = spawn_render_worker(&myself, state.render_args.clone()).await?;
            }
            WorkerKind::Persistence => {
                state.persistence =
                    spawn_persistence_worker(&myself, state.persistence_args.clone()).await?;
            }
        }
        state.stats.restarts += 1;
        tracing::info!("Restarted {} worker", worker);

        let _ = state.event_tx.send(PipelineEvent::WorkerRestarted {
            worker,
            reason,
            timestamp: Utc::now(),
        });

        Ok(())
    }
}
