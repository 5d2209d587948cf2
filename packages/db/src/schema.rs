//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(PARTICIPATION_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Participation table schema: one row per (student, quiz) attempt.
const PARTICIPATION_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS participation SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS student_id ON participation TYPE string;
DEFINE FIELD IF NOT EXISTS quiz_id ON participation TYPE string;
DEFINE FIELD IF NOT EXISTS team_name ON participation TYPE string;
DEFINE FIELD IF NOT EXISTS score ON participation TYPE number;
DEFINE FIELD IF NOT EXISTS submitted_at ON participation TYPE string;
DEFINE FIELD IF NOT EXISTS certificate_generated ON participation TYPE bool DEFAULT false;
DEFINE FIELD IF NOT EXISTS certificate_url ON participation TYPE option<string>;
DEFINE FIELD IF NOT EXISTS certificate_generated_at ON participation TYPE option<string>;

-- One attempt per student and quiz
DEFINE INDEX IF NOT EXISTS participation_attempt ON participation FIELDS student_id, quiz_id UNIQUE;
DEFINE INDEX IF NOT EXISTS participation_quiz ON participation FIELDS quiz_id;
DEFINE INDEX IF NOT EXISTS participation_certificate ON participation FIELDS quiz_id, certificate_generated;
"#;
