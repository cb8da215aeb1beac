//! Bundled schema migration.
//!
//! The SQL is idempotent (`CREATE TABLE IF NOT EXISTS`) and runs as one
//! batch over a pooled async connection.

use diesel_async::SimpleAsyncConnection;
use tracing::info;

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::pool::DbPool;
use crate::domain::ports::UserStoreError;

/// SQL creating the `users` table.
pub const CREATE_USERS_SQL: &str =
    include_str!("../../../migrations/2024-01-01-000000_create_users/up.sql");

/// Create the `users` table if it is missing.
///
/// # Errors
///
/// Returns [`UserStoreError`] when no connection is available or the SQL
/// fails.
pub async fn apply_migrations(pool: &DbPool) -> Result<(), UserStoreError> {
    let mut conn = pool.get().await.map_err(map_pool_error)?;
    conn.batch_execute(CREATE_USERS_SQL)
        .await
        .map_err(|error| map_diesel_error(error, "apply migrations"))?;
    info!("users schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_sql_is_idempotent_and_names_the_email_constraint() {
        assert!(CREATE_USERS_SQL.contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(CREATE_USERS_SQL.contains("users_email_key UNIQUE (email)"));
    }
}
