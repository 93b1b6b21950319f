//! SQL Query MCP Server Library
//!
//! This library exposes a read-only SQL query gateway over MCP (Model Context
//! Protocol): a lazily created connection pool, a `SELECT`-only guard, an
//! executor that bounds every statement with a session execution-time
//! ceiling, and a tool gateway that always answers with a structured result.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use db::{PoolManager, QueryExecutor};
pub use error::DbError;
pub use mcp::ToolGateway;
pub use models::{ErrorCode, PoolConfig, QueryRequest, QueryResult};
