//! The `query` tool: descriptor and argument decoding.
//!
//! This module declares the single tool exposed over MCP and turns the raw
//! argument object of a tool call into a [`QueryRequest`].

use crate::error::{DbError, DbResult};
use crate::models::QueryRequest;
use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Name of the only tool this server exposes.
pub const QUERY_TOOL_NAME: &str = "query";

const QUERY_TOOL_DESCRIPTION: &str = "Execute a SELECT query against the database.\n\
Only SELECT statements are allowed, ensuring read-only access.\n\
Returns JSON: {\"success\": true, \"data\": [rows]} or {\"success\": false, \"error_code\": ..., \"message\": ...}.";

/// Input for the query tool. Used for schema generation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// SELECT statement to execute (only SELECT statements are supported)
    pub sql: String,
    /// Execution time limit in seconds. Defaults to the server setting; clamped to 1..=300
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
}

/// JSON schema for [`QueryInput`].
pub fn input_schema() -> Arc<JsonObject> {
    let schema = schemars::schema_for!(QueryInput);
    let object = match serde_json::to_value(schema) {
        Ok(JsonValue::Object(map)) => map,
        _ => JsonObject::new(),
    };
    Arc::new(object)
}

/// Tool descriptor advertised by tool discovery.
pub fn query_tool() -> Tool {
    Tool::new(QUERY_TOOL_NAME, QUERY_TOOL_DESCRIPTION, input_schema())
}

/// Decode tool-call arguments into a request.
///
/// `sql` must be a non-empty string; anything else is a missing parameter.
/// A `timeout_seconds` that is not an integer is ignored. Other keys are
/// ignored.
pub fn decode_arguments(arguments: Option<&JsonObject>) -> DbResult<QueryRequest> {
    let sql = arguments
        .and_then(|args| args.get("sql"))
        .and_then(JsonValue::as_str)
        .filter(|sql| !sql.is_empty())
        .ok_or_else(|| DbError::missing_parameter("sql"))?;

    let timeout_seconds = arguments
        .and_then(|args| args.get("timeout_seconds"))
        .and_then(JsonValue::as_i64);

    Ok(QueryRequest {
        sql: sql.to_string(),
        timeout_seconds,
    })
}
