//! Core domain types for the certificate pipeline.
//!
//! This crate contains shared types used across all packages:
//! - CertificateJob and its identifiers for work handed to the render worker
//! - RenderResult, PersistenceJob and PersistenceResult for worker replies
//! - Storage key sanitization and the certificate/email HTML templates
//! - Events for observing the pipeline
//! - Environment helpers for the `from_env` constructors

pub mod env;
mod events;
mod job;
pub mod key;
mod result;
pub mod template;

pub use events::{PipelineEvent, RenderStage, WorkerKind};
pub use job::{CertificateJob, JobId, JobValidationError, QuizId, StudentId};
pub use key::{certificate_key, sanitize_key_segment};
pub use result::{
    ArtifactLocation, PersistenceJob, PersistenceOutcome, PersistenceResult, RenderOutcome,
    RenderResult,
};
pub use template::{CertificateDetails, EmailContent, certificate_email, certificate_html};
