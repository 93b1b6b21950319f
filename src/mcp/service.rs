//! MCP service implementation using rmcp.
//!
//! [`ToolGateway`] exposes the single `query` tool. Every tool call produces
//! a serialized [`QueryResult`] as text content: protocol-level errors are
//! never raised for unknown tools, bad arguments or failed queries, so
//! callers always get the structured `success`/`error_code` payload.

use crate::db::{PoolManager, QueryExecutor};
use crate::error::DbError;
use crate::mcp::workers::QueryWorkers;
use crate::models::QueryResult;
use crate::tools::{QUERY_TOOL_NAME, decode_arguments, query_tool};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject,
        ListToolsResult, PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
        Tool,
    },
    service::RequestContext,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct ToolGateway {
    /// Shared executor over the process-wide pool
    executor: QueryExecutor,
    /// Bounded workers that run each invocation off the dispatch loop
    workers: QueryWorkers,
}

impl ToolGateway {
    /// Create a new gateway.
    ///
    /// # Arguments
    ///
    /// * `pool` - Shared pool manager for all tool calls
    /// * `workers` - Worker bound for concurrently running queries
    pub fn new(pool: Arc<PoolManager>, workers: QueryWorkers) -> Self {
        Self {
            executor: QueryExecutor::new(pool),
            workers,
        }
    }

    /// The pool manager behind this gateway.
    pub fn pool(&self) -> &Arc<PoolManager> {
        self.executor.pool()
    }

    /// Descriptors for tool discovery.
    pub fn tools(&self) -> Vec<Tool> {
        vec![query_tool()]
    }

    /// Dispatch a tool call.
    ///
    /// Unknown tools and missing arguments are answered without touching the
    /// pool. Query execution runs on a worker; a worker failure is reported
    /// as `UNEXPECTED_ERROR`.
    pub async fn invoke(&self, tool_name: &str, arguments: Option<&JsonObject>) -> QueryResult {
        info!(tool = %tool_name, "Tool call received");

        if tool_name != QUERY_TOOL_NAME {
            let err = DbError::unknown_tool(tool_name);
            info!(tool = %tool_name, code = %err.code(), "Rejected tool call");
            return err.into();
        }

        let request = match decode_arguments(arguments) {
            Ok(request) => request,
            Err(e) => {
                info!(code = %e.code(), error = %e, "Rejected tool call");
                return e.into();
            }
        };

        let executor = self.executor.clone();
        match self
            .workers
            .run(async move { executor.execute(&request).await })
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Unclassified failure during tool call");
                e.into()
            }
        }
    }

    /// Dispatch a tool call and serialize the outcome to JSON text.
    pub async fn invoke_serialized(&self, tool_name: &str, arguments: Option<&JsonObject>) -> String {
        self.invoke(tool_name, arguments).await.to_json()
    }
}

impl ServerHandler for ToolGateway {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sql-query-mcp".to_owned(),
                title: Some("SQL Query MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Read-only SQL access to a single database.\n\
                \n\
                ## Tool\n\
                - `query`: run one SELECT statement. Arguments: `sql` (required), \
                `timeout_seconds` (optional, 1-300).\n\
                \n\
                ## Results\n\
                Every call returns JSON text. On success: `{\"success\": true, \"data\": [rows]}`.\n\
                On failure: `{\"success\": false, \"error_code\": ..., \"message\": ...}` where \
                `error_code` is one of INVALID_QUERY, CONNECTION_ERROR, TIMEOUT, DATABASE_ERROR, \
                UNKNOWN_TOOL, MISSING_PARAMETER, UNEXPECTED_ERROR.\n\
                TIMEOUT results also carry `timeout_seconds`; retry with a simpler query or a \
                larger timeout."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let payload = self
            .invoke_serialized(&request.name, request.arguments.as_ref())
            .await;
        Ok(CallToolResult::success(vec![Content::text(payload)]))
    }
}
