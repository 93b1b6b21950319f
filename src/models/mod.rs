//! Data models for the query gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{
    ConfigError, DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_POOL_SIZE, DEFAULT_QUERY_TIMEOUT_SECS,
    DatabaseType, PoolConfig, PoolConfigBuilder,
};
pub use query::{
    ErrorCode, MAX_QUERY_TIMEOUT_SECS, MIN_QUERY_TIMEOUT_SECS, QueryRequest, QueryResult,
    ResolvedTimeout, Row,
};
