//! Driver error classification.
//!
//! Engines report an exceeded execution ceiling in different ways. MySQL
//! says "maximum statement execution time exceeded" (error 3024), PostgreSQL
//! cancels with SQLSTATE 57014 ("canceling statement due to statement
//! timeout"). Everything that does not look like a timeout is a generic
//! database error.

use crate::error::DbError;
use crate::models::ErrorCode;

/// Case-insensitive message fragments that identify a timeout.
const TIMEOUT_SIGNATURES: &[&str] = &["max_execution_time", "timeout", "time exceeded"];

/// SQLSTATE codes that identify a timeout (PostgreSQL `query_canceled`).
const TIMEOUT_SQL_STATES: &[&str] = &["57014"];

/// Classify a driver failure as either `TIMEOUT` or `DATABASE_ERROR`.
pub fn classify_driver_error(message: &str, sql_state: Option<&str>) -> ErrorCode {
    if sql_state.is_some_and(|state| TIMEOUT_SQL_STATES.contains(&state)) {
        return ErrorCode::Timeout;
    }

    let lower = message.to_lowercase();
    if TIMEOUT_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        ErrorCode::Timeout
    } else {
        ErrorCode::DatabaseError
    }
}

/// Split a sqlx error into its display text and SQLSTATE, if any.
fn error_parts(err: &sqlx::Error) -> (String, Option<String>) {
    match err {
        sqlx::Error::Database(db_err) => (
            db_err.to_string(),
            db_err.code().map(|code| code.into_owned()),
        ),
        other => (other.to_string(), None),
    }
}

/// Turn a sqlx error raised while running a statement into a [`DbError`].
///
/// `timeout_seconds` is the ceiling that was in effect, reported back on
/// timeouts.
pub fn classify_sqlx_error(err: sqlx::Error, timeout_seconds: u32) -> DbError {
    let (message, sql_state) = error_parts(&err);

    match classify_driver_error(&message, sql_state.as_deref()) {
        ErrorCode::Timeout => DbError::timeout(message, timeout_seconds),
        _ => DbError::database(message, sql_state),
    }
}

/// Turn a sqlx error into a `DATABASE_ERROR` without consulting the timeout
/// signatures, for engines that report an exceeded ceiling out of band.
pub fn sqlx_database_error(err: sqlx::Error) -> DbError {
    let (message, sql_state) = error_parts(&err);
    DbError::database(message, sql_state)
}
