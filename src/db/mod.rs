//! Database access layer.
//!
//! This module provides database access functionality:
//! - Connection pool management
//! - Query execution under a session execution-time ceiling
//! - Driver error classification
//! - Type mappings

pub mod classifier;
pub mod executor;
pub mod pool;
pub mod types;

pub use classifier::{classify_driver_error, classify_sqlx_error, sqlx_database_error};
pub use executor::QueryExecutor;
pub use pool::{DbConnection, DbPool, PoolManager, PoolStats, PooledConnection};
