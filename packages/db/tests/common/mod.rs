use db::{Database, DbConfig, DbError};

/// Every `mem://` connection gets its own datastore, so tests don't share rows.
pub async fn setup_db() -> Result<Database, DbError> {
    db::init(&DbConfig::memory()).await
}
