//! Error mapping shared by the Diesel store adapter.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;
use crate::domain::ports::UserStoreError;

/// Map pool failures to store connection errors.
pub fn map_pool_error(error: PoolError) -> UserStoreError {
    UserStoreError::connection(error.into_message())
}

/// Map Diesel failures to store errors, tagging the failed operation.
///
/// Closed connections count as connection errors; every other failure is a
/// query error carrying the database message.
pub fn map_diesel_error(error: DieselError, operation: &str) -> UserStoreError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), %operation, "diesel operation failed");
        }
        _ => debug!(%error, %operation, "diesel operation failed"),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            UserStoreError::connection(format!("{operation}: {}", info.message()))
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            UserStoreError::query(format!(
                "{operation}: unique constraint {} violated",
                info.constraint_name().unwrap_or("unknown")
            ))
        }
        other => UserStoreError::query(format!("{operation}: {other}")),
    }
}
