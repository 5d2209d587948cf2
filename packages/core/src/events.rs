//! Event types for observing the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, PersistenceResult, QuizId, RenderResult, StudentId};

/// Which worker an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    Render,
    Persistence,
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerKind::Render => write!(f, "render"),
            WorkerKind::Persistence => write!(f, "persistence"),
        }
    }
}

/// Steps a job passes through inside a worker.
///
/// The render worker walks `Rendering → Uploading → Notifying → Reporting`;
/// the persistence worker walks `Writing → Reporting`. A failure in any step
/// jumps straight to `Reporting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    Idle,
    Rendering,
    Uploading,
    Notifying,
    Writing,
    Reporting,
}

impl RenderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStage::Idle => "idle",
            RenderStage::Rendering => "rendering",
            RenderStage::Uploading => "uploading",
            RenderStage::Notifying => "notifying",
            RenderStage::Writing => "writing",
            RenderStage::Reporting => "reporting",
        }
    }
}

impl std::fmt::Display for RenderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A certificate job was accepted by the coordinator.
    JobSubmitted {
        job_id: JobId,
        student_id: StudentId,
        quiz_id: QuizId,
        timestamp: DateTime<Utc>,
    },
    /// A worker moved a job into a new step.
    StageEntered {
        job_id: JobId,
        worker: WorkerKind,
        stage: RenderStage,
        timestamp: DateTime<Utc>,
    },
    /// The render worker reported back.
    RenderFinished {
        result: RenderResult,
        timestamp: DateTime<Utc>,
    },
    /// A persistence job was handed to the persistence worker.
    PersistenceScheduled {
        job_id: JobId,
        student_id: StudentId,
        quiz_id: QuizId,
        timestamp: DateTime<Utc>,
    },
    /// The persistence worker reported back.
    PersistenceFinished {
        result: PersistenceResult,
        timestamp: DateTime<Utc>,
    },
    /// A crashed worker was replaced.
    WorkerRestarted {
        worker: WorkerKind,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Get the job ID if the event is about a specific job.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            PipelineEvent::JobSubmitted { job_id, .. } => Some(*job_id),
            PipelineEvent::StageEntered { job_id, .. } => Some(*job_id),
            PipelineEvent::RenderFinished { result, .. } => Some(result.job_id),
            PipelineEvent::PersistenceScheduled { job_id, .. } => Some(*job_id),
            PipelineEvent::PersistenceFinished { result, .. } => Some(result.job_id),
            PipelineEvent::WorkerRestarted { .. } => None,
        }
    }
}
