//! Messages the workers send back to the coordinator.

use serde::{Deserialize, Serialize};

use crate::{JobId, QuizId, StudentId};

/// Where an uploaded certificate lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    /// Object key inside the bucket.
    pub key: String,
    /// Publicly resolvable URL for the object.
    pub url: String,
}

/// Outcome of a render job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenderOutcome {
    /// The PDF was rendered, uploaded and emailed.
    Done { artifact: ArtifactLocation },
    /// Some step failed; the detail is human readable.
    Error { error: String },
}

/// Reply from the render worker, one per certificate job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    pub job_id: JobId,
    pub student_id: StudentId,
    pub quiz_id: QuizId,
    #[serde(flatten)]
    pub outcome: RenderOutcome,
}

impl RenderResult {
    pub fn done(
        job_id: JobId,
        student_id: StudentId,
        quiz_id: QuizId,
        artifact: ArtifactLocation,
    ) -> Self {
        Self {
            job_id,
            student_id,
            quiz_id,
            outcome: RenderOutcome::Done { artifact },
        }
    }

    pub fn error(
        job_id: JobId,
        student_id: StudentId,
        quiz_id: QuizId,
        error: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            student_id,
            quiz_id,
            outcome: RenderOutcome::Error {
                error: error.into(),
            },
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, RenderOutcome::Done { .. })
    }

    /// The uploaded artifact, if the job succeeded.
    pub fn artifact(&self) -> Option<&ArtifactLocation> {
        match &self.outcome {
            RenderOutcome::Done { artifact } => Some(artifact),
            RenderOutcome::Error { .. } => None,
        }
    }

    /// The failure detail, if the job failed.
    pub fn error_detail(&self) -> Option<&str> {
        match &self.outcome {
            RenderOutcome::Done { .. } => None,
            RenderOutcome::Error { error } => Some(error),
        }
    }

    /// Turn a successful result into the follow-up write.
    ///
    /// Returns `None` for failed results, so a persistence job can only ever
    /// carry a location the storage backend confirmed.
    pub fn into_persistence_job(self) -> Option<PersistenceJob> {
        match self.outcome {
            RenderOutcome::Done { artifact } => Some(PersistenceJob {
                job_id: self.job_id,
                student_id: self.student_id,
                quiz_id: self.quiz_id,
                artifact,
            }),
            RenderOutcome::Error { .. } => None,
        }
    }
}

/// Input to the persistence worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceJob {
    pub job_id: JobId,
    pub student_id: StudentId,
    pub quiz_id: QuizId,
    pub artifact: ArtifactLocation,
}

/// Outcome of a persistence job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistenceOutcome {
    Done,
    Error { error: String },
}

/// Reply from the persistence worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceResult {
    pub job_id: JobId,
    pub student_id: StudentId,
    pub quiz_id: QuizId,
    #[serde(flatten)]
    pub outcome: PersistenceOutcome,
}

impl PersistenceResult {
    pub fn done(job: &PersistenceJob) -> Self {
        Self {
            job_id: job.job_id,
            student_id: job.student_id.clone(),
            quiz_id: job.quiz_id.clone(),
            outcome: PersistenceOutcome::Done,
        }
    }

    pub fn error(job: &PersistenceJob, error: impl Into<String>) -> Self {
        Self {
            job_id: job.job_id,
            student_id: job.student_id.clone(),
            quiz_id: job.quiz_id.clone(),
            outcome: PersistenceOutcome::Error {
                error: error.into(),
            },
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, PersistenceOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> ArtifactLocation {
        ArtifactLocation {
            key: "certificates/q/t/s".into(),
            url: "https://bucket.s3.amazonaws.com/certificates/q/t/s".into(),
        }
    }

    #[test]
    fn done_result_becomes_persistence_job() {
        let job_id = JobId::new();
        let result = RenderResult::done(
            job_id,
            StudentId::new("stu-1"),
            QuizId::new("quiz-1"),
            location(),
        );
        assert!(result.is_done());
        assert_eq!(result.error_detail(), None);

        let job = result.into_persistence_job();
        assert_eq!(
            job,
            Some(PersistenceJob {
                job_id,
                student_id: StudentId::new("stu-1"),
                quiz_id: QuizId::new("quiz-1"),
                artifact: location(),
            })
        );
    }

    #[test]
    fn error_result_never_becomes_persistence_job() {
        let result = RenderResult::error(
            JobId::new(),
            StudentId::new("stu-1"),
            QuizId::new("quiz-1"),
            "upload failed",
        );
        assert!(!result.is_done());
        assert_eq!(result.artifact(), None);
        assert_eq!(result.error_detail(), Some("upload failed"));
        assert_eq!(result.into_persistence_job(), None);
    }

    #[test]
    fn results_carry_status_tag() -> Result<(), serde_json::Error> {
        let done = RenderResult::done(
            JobId::new(),
            StudentId::new("stu-1"),
            QuizId::new("quiz-1"),
            location(),
        );
        let value = serde_json::to_value(&done)?;
        assert_eq!(value["status"], "done");
        assert_eq!(value["artifact"]["key"], "certificates/q/t/s");
        assert!(value.get("error").is_none());

        let failed = RenderResult::error(
            JobId::new(),
            StudentId::new("stu-1"),
            QuizId::new("quiz-1"),
            "boom",
        );
        let value = serde_json::to_value(&failed)?;
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "boom");
        assert!(value.get("artifact").is_none());
        Ok(())
    }
}
