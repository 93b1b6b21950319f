//! Query execution engine.
//!
//! [`QueryExecutor::execute`] runs one read-only statement under a
//! session-level execution-time ceiling and always yields a [`QueryResult`]:
//!
//! 1. the statement passes the `SELECT` guard before any pool work
//! 2. the pool is created if needed and a connection is borrowed
//! 3. the ceiling is set on the borrowed session, the statement runs
//! 4. the ceiling is reset and the connection returns to the pool
//!
//! # Architecture
//!
//! The ceiling is engine specific and lives in per-database submodules:
//! - `mysql`: `max_execution_time` session variable
//! - `postgres`: `statement_timeout` setting
//! - `sqlite`: progress handler that interrupts the statement at a deadline
//!
//! Statements are sent unprepared, so values arrive in the engines' text
//! representation and are mapped by [`crate::db::types`].

use crate::db::pool::{DbConnection, PoolManager};
use crate::error::{DbError, DbResult};
use crate::models::{QueryRequest, QueryResult, Row};
use crate::tools::guard;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs read-only statements against the managed pool.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: Arc<PoolManager>,
}

impl QueryExecutor {
    pub fn new(pool: Arc<PoolManager>) -> Self {
        Self { pool }
    }

    /// The pool manager this executor borrows from.
    pub fn pool(&self) -> &Arc<PoolManager> {
        &self.pool
    }

    /// Execute a statement and return the tagged outcome.
    ///
    /// Never returns an error: every failure is classified into a
    /// [`QueryResult::Failure`]. The borrowed connection is released on every
    /// path before this returns.
    pub async fn execute(&self, request: &QueryRequest) -> QueryResult {
        let start = Instant::now();
        match self.try_execute(request).await {
            Ok(rows) => {
                info!(
                    row_count = rows.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Query succeeded"
                );
                QueryResult::success(rows)
            }
            Err(e) => {
                log_failure(&e);
                e.into()
            }
        }
    }

    async fn try_execute(&self, request: &QueryRequest) -> DbResult<Vec<Row>> {
        guard::validate(&request.sql)?;

        self.pool.connect().await?;

        let resolved = request.resolve_timeout(self.pool.config().default_timeout_seconds());
        let timeout_secs = resolved.seconds;
        if resolved.clamped {
            warn!(
                requested = ?request.timeout_seconds,
                effective = timeout_secs,
                "Query timeout clamped"
            );
        }

        let mut conn = self.pool.get_connection().await?;

        debug!(
            sql = %guard::preview(&request.sql),
            timeout_secs,
            engine = %conn.db_type(),
            "Executing query"
        );

        // `conn` drops at the end of this scope whatever the outcome
        match conn.connection_mut() {
            DbConnection::MySql(c) => mysql::fetch_rows(c, &request.sql, timeout_secs).await,
            DbConnection::Postgres(c) => {
                postgres::fetch_rows(c, &request.sql, timeout_secs).await
            }
            DbConnection::SQLite(c) => sqlite::fetch_rows(c, &request.sql, timeout_secs).await,
        }
    }
}

fn log_failure(err: &DbError) {
    match err {
        DbError::InvalidQuery { .. } => {}
        DbError::Timeout {
            message,
            timeout_seconds,
        } => warn!(timeout_seconds, error = %message, "Query timed out"),
        DbError::Connection { message } => error!(error = %message, "Database connection failed"),
        DbError::Database { message, sql_state } => {
            error!(error = %message, sql_state = ?sql_state, "Query failed")
        }
        other => error!(error = %other, code = %other.code(), "Unexpected query failure"),
    }
}

/// Milliseconds for a ceiling in seconds.
fn ceiling_millis(timeout_secs: u32) -> u64 {
    u64::from(timeout_secs) * 1000
}

mod mysql {
    use super::*;
    use crate::db::classifier::classify_sqlx_error;
    use crate::db::types::row_to_json;
    use sqlx::{Executor, MySqlConnection};

    pub(super) fn ceiling_statement(timeout_secs: u32) -> String {
        format!(
            "SET SESSION max_execution_time = {}",
            ceiling_millis(timeout_secs)
        )
    }

    const RESET_CEILING: &str = "SET SESSION max_execution_time = DEFAULT";

    pub async fn fetch_rows(
        conn: &mut MySqlConnection,
        sql: &str,
        timeout_secs: u32,
    ) -> DbResult<Vec<Row>> {
        let ceiling = ceiling_statement(timeout_secs);
        Executor::execute(&mut *conn, sqlx::raw_sql(&ceiling))
            .await
            .map_err(|e| classify_sqlx_error(e, timeout_secs))?;

        let result = Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql)).await;

        if let Err(e) = Executor::execute(&mut *conn, sqlx::raw_sql(RESET_CEILING)).await {
            debug!(error = %e, "Failed to reset session execution time limit");
        }

        let rows = result.map_err(|e| classify_sqlx_error(e, timeout_secs))?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

mod postgres {
    use super::*;
    use crate::db::classifier::classify_sqlx_error;
    use crate::db::types::row_to_json;
    use sqlx::{Executor, PgConnection};

    pub(super) fn ceiling_statement(timeout_secs: u32) -> String {
        format!("SET statement_timeout = {}", ceiling_millis(timeout_secs))
    }

    const RESET_CEILING: &str = "SET statement_timeout TO DEFAULT";

    pub async fn fetch_rows(
        conn: &mut PgConnection,
        sql: &str,
        timeout_secs: u32,
    ) -> DbResult<Vec<Row>> {
        let ceiling = ceiling_statement(timeout_secs);
        Executor::execute(&mut *conn, sqlx::raw_sql(&ceiling))
            .await
            .map_err(|e| classify_sqlx_error(e, timeout_secs))?;

        let result = Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql)).await;

        if let Err(e) = Executor::execute(&mut *conn, sqlx::raw_sql(RESET_CEILING)).await {
            debug!(error = %e, "Failed to reset statement_timeout");
        }

        let rows = result.map_err(|e| classify_sqlx_error(e, timeout_secs))?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

mod sqlite {
    use super::*;
    use crate::db::classifier::sqlx_database_error;
    use crate::db::types::row_to_json;
    use sqlx::{Executor, SqliteConnection};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Virtual machine instructions between deadline checks.
    const PROGRESS_INTERVAL_OPS: i32 = 1000;

    pub async fn fetch_rows(
        conn: &mut SqliteConnection,
        sql: &str,
        timeout_secs: u32,
    ) -> DbResult<Vec<Row>> {
        let deadline = Instant::now() + Duration::from_secs(u64::from(timeout_secs));
        let interrupted = Arc::new(AtomicBool::new(false));

        {
            let mut handle = conn
                .lock_handle()
                .await
                .map_err(sqlx_database_error)?;
            let interrupted = Arc::clone(&interrupted);
            handle.set_progress_handler(PROGRESS_INTERVAL_OPS, move || {
                if Instant::now() < deadline {
                    true
                } else {
                    interrupted.store(true, Ordering::Release);
                    false
                }
            });
        }

        let result = Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql)).await;

        match conn.lock_handle().await {
            Ok(mut handle) => {
                handle.remove_progress_handler();
            }
            Err(e) => debug!(error = %e, "Failed to remove progress handler"),
        }

        match result {
            Ok(rows) => Ok(rows.iter().map(row_to_json).collect()),
            Err(e) if interrupted.load(Ordering::Acquire) => Err(DbError::timeout(
                format!("statement interrupted: maximum execution time exceeded ({})", e),
                timeout_secs,
            )),
            // Only the progress handler signals a timeout on SQLite
            Err(e) => Err(sqlx_database_error(e)),
        }
    }
}
