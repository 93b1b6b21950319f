//! MCP tool implementations.
//!
//! - `guard`: read-only statement check applied before any connection is used
//! - `query`: descriptor and argument decoding for the `query` tool

pub mod guard;
pub mod query;

pub use query::{QUERY_TOOL_NAME, QueryInput, decode_arguments, query_tool};
