//! Query-related data models.
//!
//! This module defines the query request, the tagged query outcome and the
//! stable error codes that travel over the wire.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Minimum effective query timeout in seconds.
pub const MIN_QUERY_TIMEOUT_SECS: u32 = 1;

/// Maximum effective query timeout in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u32 = 300;

/// A result row: column name to value.
pub type Row = serde_json::Map<String, JsonValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    /// Falls back to the pool's default when absent
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
}

impl QueryRequest {
    /// Create a new query request using the default timeout.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            timeout_seconds: None,
        }
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout_seconds: i64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Resolve the effective timeout, clamped to
    /// [`MIN_QUERY_TIMEOUT_SECS`, `MAX_QUERY_TIMEOUT_SECS`].
    pub fn effective_timeout(&self, default_secs: u32) -> u32 {
        self.resolve_timeout(default_secs).seconds
    }

    /// Resolve the effective timeout and note whether the request was clamped.
    pub fn resolve_timeout(&self, default_secs: u32) -> ResolvedTimeout {
        match self.timeout_seconds {
            None => ResolvedTimeout {
                seconds: default_secs,
                clamped: false,
            },
            Some(t) => {
                let seconds = t.clamp(
                    i64::from(MIN_QUERY_TIMEOUT_SECS),
                    i64::from(MAX_QUERY_TIMEOUT_SECS),
                );
                ResolvedTimeout {
                    seconds: seconds as u32,
                    clamped: seconds != t,
                }
            }
        }
    }
}

/// Ceiling applied to one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimeout {
    pub seconds: u32,
    /// The requested value fell outside the allowed range
    pub clamped: bool,
}

/// Stable error taxonomy tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidQuery,
    ConnectionError,
    Timeout,
    DatabaseError,
    UnknownTool,
    MissingParameter,
    UnexpectedError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidQuery => "INVALID_QUERY",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::UnknownTool => "UNKNOWN_TOOL",
            Self::MissingParameter => "MISSING_PARAMETER",
            Self::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a query. Exactly one variant is active.
///
/// Serializes to `{"success": true, "data": [...]}` or
/// `{"success": false, "error_code": "...", "message": "..."}`, with
/// `timeout_seconds` added for `TIMEOUT` failures.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Success {
        rows: Vec<Row>,
    },
    Failure {
        error_code: ErrorCode,
        message: String,
        timeout_seconds: Option<u32>,
    },
}

impl QueryResult {
    pub fn success(rows: Vec<Row>) -> Self {
        Self::Success { rows }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Rows of a successful result.
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            Self::Success { rows } => Some(rows),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_code, .. } => Some(*error_code),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }

    /// Render the response payload: pretty JSON, non-ASCII kept as-is.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(
                r#"{{"success": false, "error_code": "UNEXPECTED_ERROR", "message": {}}}"#,
                JsonValue::String(format!("Failed to serialize result: {e}"))
            )
        })
    }
}

impl Serialize for QueryResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Success { rows } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", rows)?;
                map.end()
            }
            Self::Failure {
                error_code,
                message,
                timeout_seconds,
            } => {
                let len = if timeout_seconds.is_some() { 4 } else { 3 };
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error_code", error_code)?;
                map.serialize_entry("message", message)?;
                if let Some(secs) = timeout_seconds {
                    map.serialize_entry("timeout_seconds", secs)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_effective_timeout_default() {
        let req = QueryRequest::new("SELECT 1");
        assert_eq!(req.effective_timeout(15), 15);
    }

    #[test]
    fn test_effective_timeout_clamped() {
        assert_eq!(QueryRequest::new("SELECT 1").with_timeout(0).effective_timeout(15), 1);
        assert_eq!(QueryRequest::new("SELECT 1").with_timeout(-7).effective_timeout(15), 1);
        assert_eq!(
            QueryRequest::new("SELECT 1").with_timeout(99999).effective_timeout(15),
            MAX_QUERY_TIMEOUT_SECS
        );
        assert_eq!(QueryRequest::new("SELECT 1").with_timeout(42).effective_timeout(15), 42);
    }

    #[test]
    fn test_resolve_timeout_reports_clamping() {
        let resolved = QueryRequest::new("SELECT 1").with_timeout(0).resolve_timeout(15);
        assert_eq!(resolved, ResolvedTimeout { seconds: 1, clamped: true });

        let resolved = QueryRequest::new("SELECT 1").with_timeout(300).resolve_timeout(15);
        assert!(!resolved.clamped);

        // The configured default is never reported as clamped
        let resolved = QueryRequest::new("SELECT 1").resolve_timeout(15);
        assert_eq!(resolved, ResolvedTimeout { seconds: 15, clamped: false });
    }

    #[test]
    fn test_request_deserialization() {
        let req: QueryRequest = serde_json::from_str(r#"{"sql": "SELECT 1"}"#).unwrap();
        assert_eq!(req.sql, "SELECT 1");
        assert_eq!(req.timeout_seconds, None);
    }

    #[test]
    fn test_success_serialization() {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(1));
        row.insert("name".to_string(), json!("Alice"));
        let value = serde_json::to_value(QueryResult::success(vec![row])).unwrap();
        assert_eq!(
            value,
            json!({"success": true, "data": [{"id": 1, "name": "Alice"}]})
        );
    }

    #[test]
    fn test_empty_success_serialization() {
        let value = serde_json::to_value(QueryResult::success(Vec::new())).unwrap();
        assert_eq!(value, json!({"success": true, "data": []}));
    }

    #[test]
    fn test_failure_serialization_without_timeout() {
        let result = QueryResult::Failure {
            error_code: ErrorCode::DatabaseError,
            message: "Table 'shop.nope' doesn't exist".to_string(),
            timeout_seconds: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error_code"], json!("DATABASE_ERROR"));
        assert!(value.get("timeout_seconds").is_none());
    }

    #[test]
    fn test_timeout_serialization() {
        let result = QueryResult::Failure {
            error_code: ErrorCode::Timeout,
            message: "too slow".to_string(),
            timeout_seconds: Some(15),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["error_code"], json!("TIMEOUT"));
        assert_eq!(value["timeout_seconds"], json!(15));
    }

    #[test]
    fn test_to_json_keeps_non_ascii() {
        let mut row = Row::new();
        row.insert("name".to_string(), json!("张三"));
        let text = QueryResult::success(vec![row]).to_json();
        assert!(text.contains("张三"));
    }

    #[test]
    fn test_error_code_names() {
        assert_eq!(
            serde_json::to_value(ErrorCode::MissingParameter).unwrap(),
            json!("MISSING_PARAMETER")
        );
        assert_eq!(ErrorCode::ConnectionError.to_string(), "CONNECTION_ERROR");
    }
}
