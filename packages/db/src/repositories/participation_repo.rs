//! Participation repository: quiz attempts and their certificate state.

use certificate_core::{QuizId, StudentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use crate::{Database, DbError};

/// A student's attempt at a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub student_id: StudentId,
    pub quiz_id: QuizId,
    pub team_name: String,
    pub score: f64,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub certificate_generated: bool,
    #[serde(default)]
    pub certificate_url: Option<String>,
    #[serde(default)]
    pub certificate_generated_at: Option<DateTime<Utc>>,
}

impl Participation {
    /// Create an attempt record without a certificate.
    pub fn new(
        student_id: StudentId,
        quiz_id: QuizId,
        team_name: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            student_id,
            quiz_id,
            team_name: team_name.into(),
            score,
            submitted_at: Utc::now(),
            certificate_generated: false,
            certificate_url: None,
            certificate_generated_at: None,
        }
    }
}

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
struct ParticipationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    #[serde(flatten)]
    participation: Participation,
}

/// Repository for participation persistence operations.
#[derive(Clone)]
pub struct ParticipationRepository {
    db: Database,
}

impl ParticipationRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new attempt record.
    pub async fn create(&self, participation: &Participation) -> Result<Participation, DbError> {
        let record: Option<ParticipationRecord> = self
            .db
            .create("participation")
            .content(participation.clone())
            .await?;

        record
            .map(|r| r.participation)
            .ok_or_else(|| DbError::Query("Failed to create participation".into()))
    }

    /// Get the attempt for a student and quiz.
    pub async fn get(
        &self,
        student_id: &StudentId,
        quiz_id: &QuizId,
    ) -> Result<Participation, DbError> {
        let mut response = self
            .db
            .query(
                r#"
                SELECT * FROM participation
                WHERE student_id = $student_id AND quiz_id = $quiz_id
                LIMIT 1
                "#,
            )
            .bind(("student_id", student_id.to_string()))
            .bind(("quiz_id", quiz_id.to_string()))
            .await?;

        let records: Vec<ParticipationRecord> = response.take(0)?;

        records
            .into_iter()
            .next()
            .map(|r| r.participation)
            .ok_or_else(|| not_found(student_id, quiz_id))
    }

    /// List attempts for a quiz, optionally only those still waiting for a certificate.
    pub async fn list_for_quiz(
        &self,
        quiz_id: &QuizId,
        missing_certificate_only: bool,
    ) -> Result<Vec<Participation>, DbError> {
        let query = if missing_certificate_only {
            "SELECT * FROM participation WHERE quiz_id = $quiz_id AND certificate_generated = false ORDER BY submitted_at ASC"
        } else {
            "SELECT * FROM participation WHERE quiz_id = $quiz_id ORDER BY submitted_at ASC"
        };

        let mut response = self
            .db
            .query(query)
            .bind(("quiz_id", quiz_id.to_string()))
            .await?;

        let records: Vec<ParticipationRecord> = response.take(0)?;

        Ok(records.into_iter().map(|r| r.participation).collect())
    }

    /// Record that a certificate was generated for an attempt.
    ///
    /// Updates exactly the row identified by `(student_id, quiz_id)`. Fails with
    /// [`DbError::NotFound`] when no such attempt exists; nothing is created.
    pub async fn mark_certificate_generated(
        &self,
        student_id: &StudentId,
        quiz_id: &QuizId,
        certificate_url: &str,
    ) -> Result<Participation, DbError> {
        let mut response = self
            .db
            .query(
                r#"
                UPDATE participation SET
                    certificate_generated = true,
                    certificate_url = $certificate_url,
                    certificate_generated_at = $generated_at
                WHERE student_id = $student_id AND quiz_id = $quiz_id
                RETURN AFTER
                "#,
            )
            .bind(("certificate_url", certificate_url.to_string()))
            .bind(("generated_at", Utc::now().to_rfc3339()))
            .bind(("student_id", student_id.to_string()))
            .bind(("quiz_id", quiz_id.to_string()))
            .await?;

        let records: Vec<ParticipationRecord> = response.take(0)?;

        let updated = records.len();
        let mut records = records.into_iter();
        match (records.next(), records.next()) {
            (Some(record), None) => Ok(record.participation),
            (None, _) => Err(not_found(student_id, quiz_id)),
            (Some(_), Some(_)) => Err(DbError::Query(format!(
                "Expected one participation for student {} and quiz {}, updated {}",
                student_id, quiz_id, updated
            ))),
        }
    }

    /// Delete an attempt record.
    pub async fn delete(&self, student_id: &StudentId, quiz_id: &QuizId) -> Result<(), DbError> {
        self.db
            .query("DELETE participation WHERE student_id = $student_id AND quiz_id = $quiz_id")
            .bind(("student_id", student_id.to_string()))
            .bind(("quiz_id", quiz_id.to_string()))
            .await?
            .check()?;

        Ok(())
    }
}

fn not_found(student_id: &StudentId, quiz_id: &QuizId) -> DbError {
    DbError::NotFound(format!(
        "Participation not found for student {} and quiz {}",
        student_id, quiz_id
    ))
}
