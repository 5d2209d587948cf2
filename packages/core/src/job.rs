//! Certificate job types handed to the render worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a certificate job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a student, as issued by the application database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl StudentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a quiz, as issued by the application database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(pub String);

impl QuizId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QuizId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reasons a certificate job is refused before it reaches a worker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid student email: {0}")]
    InvalidEmail(String),

    #[error("score must be a finite percentage between 0 and 100, got {0}")]
    InvalidScore(f64),
}

/// A finished quiz attempt that needs a certificate.
///
/// Created by the submission handler when an attempt is finalized and moved
/// into the render worker's mailbox. It is never persisted on its own: the
/// participation record is the durable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateJob {
    /// Correlation ID for logs and events.
    pub job_id: JobId,
    pub student_id: StudentId,
    pub student_name: String,
    pub student_email: String,
    pub team_name: String,
    pub quiz_id: QuizId,
    pub quiz_title: String,
    /// When the attempt was submitted.
    pub completed_at: DateTime<Utc>,
    /// Score as a percentage.
    pub score: f64,
}

impl CertificateJob {
    /// Create a job with a fresh ID, completed now.
    pub fn new(
        student_id: StudentId,
        student_name: impl Into<String>,
        student_email: impl Into<String>,
        team_name: impl Into<String>,
        quiz_id: QuizId,
        quiz_title: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            student_id,
            student_name: student_name.into(),
            student_email: student_email.into(),
            team_name: team_name.into(),
            quiz_id,
            quiz_title: quiz_title.into(),
            completed_at: Utc::now(),
            score,
        }
    }

    /// Set the completion timestamp.
    pub fn with_completed_at(mut self, completed_at: DateTime<Utc>) -> Self {
        self.completed_at = completed_at;
        self
    }

    /// Check that every field is populated and in range.
    pub fn validate(&self) -> Result<(), JobValidationError> {
        let required = [
            ("student_id", self.student_id.as_str()),
            ("student_name", self.student_name.as_str()),
            ("student_email", self.student_email.as_str()),
            ("team_name", self.team_name.as_str()),
            ("quiz_id", self.quiz_id.as_str()),
            ("quiz_title", self.quiz_title.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(JobValidationError::MissingField(field));
            }
        }

        let email = self.student_email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(JobValidationError::InvalidEmail(email.to_string())),
        }

        if !self.score.is_finite() || !(0.0..=100.0).contains(&self.score) {
            return Err(JobValidationError::InvalidScore(self.score));
        }

        Ok(())
    }
}
