//! Error types for the query gateway.
//!
//! This module defines the flat error taxonomy using `thiserror`. Every
//! variant maps onto exactly one [`ErrorCode`], and every error is turned into
//! a [`QueryResult::Failure`] at the boundary where it is detected, so nothing
//! reaches the transport as an unhandled fault.

use crate::models::{ErrorCode, QueryResult};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Only SELECT queries are allowed (rejected: {preview})")]
    InvalidQuery { preview: String },

    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error(
        "Query exceeded the {timeout_seconds}s execution time limit ({message}). Optimize the query or raise the timeout."
    )]
    Timeout {
        /// Raw driver text
        message: String,
        timeout_seconds: u32,
    },

    #[error("Error executing query: {message}")]
    Database {
        message: String,
        /// e.g., "42S02" for a missing table
        sql_state: Option<String>,
    },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Missing required parameter '{name}': provide the SELECT statement to run")]
    MissingParameter { name: String },

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

impl DbError {
    /// Create an invalid query error carrying a short preview of the statement.
    pub fn invalid_query(preview: impl Into<String>) -> Self {
        Self::InvalidQuery {
            preview: preview.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a timeout error for the effective ceiling that was applied.
    pub fn timeout(message: impl Into<String>, timeout_seconds: u32) -> Self {
        Self::Timeout {
            message: message.into(),
            timeout_seconds,
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    /// Create an unexpected error (a gap in classification).
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// The stable taxonomy tag for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidQuery { .. } => ErrorCode::InvalidQuery,
            Self::Connection { .. } => ErrorCode::ConnectionError,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Database { .. } => ErrorCode::DatabaseError,
            Self::UnknownTool { .. } => ErrorCode::UnknownTool,
            Self::MissingParameter { .. } => ErrorCode::MissingParameter,
            Self::Unexpected { .. } => ErrorCode::UnexpectedError,
        }
    }

    /// Check if retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for QueryResult {
    fn from(err: DbError) -> Self {
        let timeout_seconds = match &err {
            DbError::Timeout {
                timeout_seconds, ..
            } => Some(*timeout_seconds),
            _ => None,
        };
        QueryResult::Failure {
            error_code: err.code(),
            message: err.to_string(),
            timeout_seconds,
        }
    }
}
