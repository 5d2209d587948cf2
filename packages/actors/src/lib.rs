//! Actor system for the certificate pipeline.
//!
//! # Architecture
//!
//! - `Coordinator` - Supervises both workers and routes their results
//! - `RenderWorker` - Renders a certificate PDF, uploads it and emails the link
//! - `PersistenceWorker` - Marks the attempt row once the certificate exists
//!
//! Each actor handles one message at a time from its own mailbox, so jobs are
//! processed in submission order per worker.
//!
//! # Usage
//!
//! ```ignore
//! use actors::{PipelineServices, PipelineSettings, start_pipeline};
//!
//! let services = PipelineServices::new(renderer, storage, mailer, participations);
//! let (pipeline, handle) = start_pipeline(services, PipelineSettings::default()).await?;
//!
//! pipeline.submit(job)?;
//! ```

mod coordinator;
pub mod journal;
mod messages;
mod persistence_worker;
mod pipeline;
pub mod registry;
mod render_worker;
pub mod services;
mod settings;

pub use coordinator::Coordinator;
pub use journal::{FailureJournal, FailureRecord, JournalError};
pub use messages::{
    CoordinatorMessage, PersistenceMessage, PipelineError, PipelineStats, RenderMessage,
};
pub use persistence_worker::PersistenceWorker;
pub use pipeline::{CertificatePipeline, start_pipeline};
pub use registry::{PipelineRegistry, global_registry};
pub use render_worker::RenderWorker;
pub use services::{
    ArtifactStore, AttemptStore, CertificateRenderer, NotificationMailer, PipelineServices,
    ServiceFuture,
};
pub use settings::{DEFAULT_RENDER_TIMEOUT, PipelineSettings};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
