//! Process-wide registry for the running pipeline.

use std::sync::{PoisonError, RwLock};

use crate::messages::PipelineError;
use crate::pipeline::CertificatePipeline;

/// Holds the one pipeline a process runs, so submission code can reach it
/// without threading the handle through every call.
#[derive(Default)]
pub struct PipelineRegistry {
    pipeline: RwLock<Option<CertificatePipeline>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the pipeline. A second registration is refused.
    pub fn register(&self, pipeline: CertificatePipeline) -> Result<(), PipelineError> {
        let mut slot = self.pipeline.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(PipelineError::AlreadyStarted);
        }
        *slot = Some(pipeline);
        Ok(())
    }

    pub fn get(&self) -> Option<CertificatePipeline> {
        self.pipeline
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget the registered pipeline, returning it.
    pub fn take(&self) -> Option<CertificatePipeline> {
        self.pipeline
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Global registry instance.
static REGISTRY: std::sync::LazyLock<PipelineRegistry> =
    std::sync::LazyLock::new(PipelineRegistry::new);

/// Get the global pipeline registry.
pub fn global_registry() -> &'static PipelineRegistry {
    &REGISTRY
}
