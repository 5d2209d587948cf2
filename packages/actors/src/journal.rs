//! File-based journal of terminal job failures.
//!
//! One JSON file per failed job and stage, written atomically. The journal is
//! for operators to inspect; nothing reads it back into the pipeline.

use std::path::{Path, PathBuf};

use certificate_core::{
    JobId, PersistenceOutcome, PersistenceResult, QuizId, RenderOutcome, RenderResult, StudentId,
    WorkerKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A job that failed for good in one of the workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub job_id: JobId,
    pub student_id: StudentId,
    pub quiz_id: QuizId,
    pub stage: WorkerKind,
    pub error: String,
    pub recorded_at: DateTime<Utc>,
}

impl FailureRecord {
    /// Record for a render result with an error outcome.
    pub fn from_render(result: &RenderResult) -> Option<Self> {
        match &result.outcome {
            RenderOutcome::Done { .. } => None,
            RenderOutcome::Error { error } => Some(Self {
                job_id: result.job_id,
                student_id: result.student_id.clone(),
                quiz_id: result.quiz_id.clone(),
                stage: WorkerKind::Render,
                error: error.clone(),
                recorded_at: Utc::now(),
            }),
        }
    }

    /// Record for a persistence result with an error outcome.
    pub fn from_persistence(result: &PersistenceResult) -> Option<Self> {
        match &result.outcome {
            PersistenceOutcome::Done => None,
            PersistenceOutcome::Error { error } => Some(Self {
                job_id: result.job_id,
                student_id: result.student_id.clone(),
                quiz_id: result.quiz_id.clone(),
                stage: WorkerKind::Persistence,
                error: error.clone(),
                recorded_at: Utc::now(),
            }),
        }
    }

    fn file_stem(&self) -> String {
        format!("{}-{}", self.stage, self.job_id)
    }
}

/// Failure journal rooted at a directory.
#[derive(Debug, Clone)]
pub struct FailureJournal {
    base_dir: PathBuf,
}

impl FailureJournal {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Ensure the base directory exists.
    pub async fn init(&self) -> Result<(), JournalError> {
        fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    /// Write a record, replacing an earlier one for the same job and stage.
    pub async fn record(&self, record: &FailureRecord) -> Result<(), JournalError> {
        let stem = record.file_stem();
        let path = self.base_dir.join(format!("{stem}.json"));
        let json = serde_json::to_string_pretty(record)?;

        // Write to temp file first, then rename
        let temp_path = self.base_dir.join(format!("{stem}.json.tmp"));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Journaled failure to {:?}", path);
        Ok(())
    }

    /// All journaled failures, oldest first.
    pub async fn list(&self) -> Result<Vec<FailureRecord>, JournalError> {
        let mut records = Vec::new();

        if !fs::try_exists(&self.base_dir).await? {
            return Ok(records);
        }

        let mut entries = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                let json = fs::read_to_string(&path).await?;
                records.push(serde_json::from_str::<FailureRecord>(&json)?);
            }
        }

        records.sort_by_key(|r| r.recorded_at);
        Ok(records)
    }

    /// Remove the record for a job and stage, if any.
    pub async fn remove(&self, stage: WorkerKind, job_id: JobId) -> Result<(), JournalError> {
        let path = self.base_dir.join(format!("{stage}-{job_id}.json"));
        if fs::try_exists(&path).await? {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

/// Journal errors.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
