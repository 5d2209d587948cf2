//! Entry points used by the quiz application.
//!
//! Submission handlers call [`submit_certificate`] once an attempt is stored;
//! the server calls [`init_certificate_pipeline`] once at start-up.

mod init;

pub use init::init_certificate_pipeline;

use actors::global_registry;
use certificate_core::{CertificateJob, JobId, PipelineEvent};
use tokio::sync::broadcast;

// Re-export core types for convenience
pub use actors::{CertificatePipeline, PipelineError, PipelineStats};
pub use certificate_core::{QuizId, StudentId};

/// Queue a certificate for a finished attempt.
///
/// Fire-and-forget: failures are logged and never reach the caller's
/// request. Returns the job ID when the job was queued.
pub fn submit_certificate(job: CertificateJob) -> Option<JobId> {
    let Some(pipeline) = global_registry().get() else {
        tracing::error!(
            student_id = %job.student_id,
            quiz_id = %job.quiz_id,
            "Certificate pipeline not started, dropping job"
        );
        return None;
    };

    let (student_id, quiz_id) = (job.student_id.clone(), job.quiz_id.clone());
    match pipeline.submit(job) {
        Ok(job_id) => Some(job_id),
        Err(e) => {
            tracing::error!(
                student_id = %student_id,
                quiz_id = %quiz_id,
                "Failed to queue certificate: {}",
                e
            );
            None
        }
    }
}

/// Subscribe to events of the registered pipeline.
pub fn subscribe_events() -> Option<broadcast::Receiver<PipelineEvent>> {
    global_registry().get().map(|p| p.subscribe())
}

/// Helper to format an event as a single JSON log line.
pub fn format_event(event: &PipelineEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string())
}

/// Stop the registered pipeline and forget it.
pub fn shutdown_certificate_pipeline() {
    if let Some(pipeline) = global_registry().take()
        && let Err(e) = pipeline.shutdown()
    {
        tracing::warn!("Certificate pipeline already stopped: {}", e);
    }
}
