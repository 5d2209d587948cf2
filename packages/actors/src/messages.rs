//! Message types for actor communication.

use std::any::Any;

use certificate_core::{
    CertificateJob, JobValidationError, PersistenceJob, PersistenceResult, RenderResult,
};
use db::DbError;
use mailer::MailError;
use ractor::RpcReplyPort;
use render::RenderError;
use serde::{Deserialize, Serialize};
use storage::StorageError;

use crate::journal::JournalError;

/// Messages for the Coordinator.
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// A validated job from a submission handler.
    Submit(Box<CertificateJob>),

    /// The render worker finished a job.
    RenderFinished(RenderResult),

    /// The persistence worker finished a job.
    PersistenceFinished(PersistenceResult),

    /// Get pipeline counters.
    GetStats { reply: RpcReplyPort<PipelineStats> },

    /// Stop both workers and the coordinator.
    Shutdown,
}

/// Messages for the RenderWorker.
#[derive(Debug)]
pub enum RenderMessage {
    /// Render, upload and announce one certificate.
    Render(Box<CertificateJob>),
}

/// Messages for the PersistenceWorker.
#[derive(Debug)]
pub enum PersistenceMessage {
    /// Mark the attempt as having its certificate.
    Persist(PersistenceJob),
}

/// Counters kept by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub submitted: u64,
    pub rendered: u64,
    pub render_failed: u64,
    pub persisted: u64,
    pub persist_failed: u64,
    pub restarts: u64,
}

impl PipelineStats {
    /// Jobs accepted but not yet through both workers.
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.render_failed)
            .saturating_sub(self.persisted)
            .saturating_sub(self.persist_failed)
    }
}

/// Error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid certificate job: {0}")]
    InvalidJob(#[from] JobValidationError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("mail error: {0}")]
    Mail(#[from] MailError),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("failure journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    #[error("certificate pipeline unavailable: {0}")]
    Unavailable(String),

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("certificate pipeline already started")]
    AlreadyStarted,

    #[error("failed to spawn actor: {0}")]
    Spawn(#[from] ractor::SpawnErr),
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}
