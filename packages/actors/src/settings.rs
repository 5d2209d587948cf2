//! Pipeline settings.

use std::path::PathBuf;
use std::time::Duration;

use certificate_core::env::{parse_positive_secs, var_non_empty};

use crate::messages::PipelineError;

/// Default upper bound for one HTML→PDF render.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Bound on the render step of one job, browser launch included.
    pub render_timeout: Duration,
    /// Respawn a worker that crashed.
    pub restart_workers: bool,
    /// Where terminal failures are journaled; `None` disables the journal.
    pub failure_journal_dir: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            restart_workers: true,
            failure_journal_dir: None,
        }
    }
}

impl PipelineSettings {
    /// Build settings from environment variables.
    ///
    /// - `CERTIFICATE_RENDER_TIMEOUT_SECS` (default: 90, must be positive)
    /// - `CERTIFICATE_RESTART_WORKERS` (`true`/`false`, default: `true`)
    /// - `CERTIFICATE_FAILURE_JOURNAL_DIR` (optional)
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_vars(var_non_empty)
    }

    /// Build settings from any variable lookup.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        let mut settings = Self::default();

        if let Some(v) = var("CERTIFICATE_RENDER_TIMEOUT_SECS") {
            settings.render_timeout = parse_positive_secs("CERTIFICATE_RENDER_TIMEOUT_SECS", &v)
                .map_err(PipelineError::InvalidConfig)?;
        }

        if let Some(v) = var("CERTIFICATE_RESTART_WORKERS") {
            settings.restart_workers = parse_bool(&v).ok_or_else(|| {
                PipelineError::InvalidConfig(format!(
                    "CERTIFICATE_RESTART_WORKERS={v} is not a boolean"
                ))
            })?;
        }

        settings.failure_journal_dir =
            var("CERTIFICATE_FAILURE_JOURNAL_DIR").map(PathBuf::from);

        Ok(settings)
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn with_restart_workers(mut self, restart: bool) -> Self {
        self.restart_workers = restart;
        self
    }

    pub fn with_failure_journal(mut self, dir: impl Into<PathBuf>) -> Self {
        self.failure_journal_dir = Some(dir.into());
        self
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
