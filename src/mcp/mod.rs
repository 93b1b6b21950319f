//! MCP server integration module.
//!
//! This module connects the MCP protocol to the query executor using the
//! rmcp framework, and offloads tool work onto bounded worker tasks.

pub mod service;
pub mod workers;

pub use service::ToolGateway;
pub use workers::QueryWorkers;
