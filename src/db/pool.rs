//! Connection pool management.
//!
//! [`PoolManager`] owns a single lazily created pool over one of the
//! database-specific sqlx pools (MySqlPool, PgPool, SqlitePool). The pool is
//! created on first demand, shared by every caller, and closed once by
//! [`PoolManager::shutdown`]. Borrowed connections are handed out as
//! [`PooledConnection`] guards that return to the pool when dropped.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, PoolConfig};
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{
    MySql, MySqlPool, PgPool, Postgres, Sqlite, SqlitePool, mysql::MySqlConnectOptions,
    mysql::MySqlPoolOptions, postgres::PgConnectOptions, postgres::PgPoolOptions,
    sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Upper bound on waiting for borrowed connections during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::Postgres(_) => DatabaseType::PostgreSQL,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Open connections, idle or in use.
    pub fn size(&self) -> u32 {
        match self {
            DbPool::MySql(pool) => pool.size(),
            DbPool::Postgres(pool) => pool.size(),
            DbPool::SQLite(pool) => pool.size(),
        }
    }

    /// Open connections currently idle.
    pub fn num_idle(&self) -> usize {
        match self {
            DbPool::MySql(pool) => pool.num_idle(),
            DbPool::Postgres(pool) => pool.num_idle(),
            DbPool::SQLite(pool) => pool.num_idle(),
        }
    }
}

/// A connection borrowed from one of the database-specific pools.
#[derive(Debug)]
pub enum DbConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    SQLite(PoolConnection<Sqlite>),
}

#[derive(Debug, Default)]
struct PoolCounters {
    borrowed_total: AtomicU64,
    in_use: AtomicUsize,
}

/// RAII guard for a borrowed connection.
///
/// Dropping the guard returns the connection to the pool and updates the
/// manager's in-use count, on success, failure and unwinding alike.
#[derive(Debug)]
pub struct PooledConnection {
    conn: DbConnection,
    counters: Arc<PoolCounters>,
}

impl PooledConnection {
    fn new(conn: DbConnection, counters: Arc<PoolCounters>) -> Self {
        counters.borrowed_total.fetch_add(1, Ordering::Relaxed);
        counters.in_use.fetch_add(1, Ordering::AcqRel);
        Self { conn, counters }
    }

    /// Get the database type of the underlying connection.
    pub fn db_type(&self) -> DatabaseType {
        match &self.conn {
            DbConnection::MySql(_) => DatabaseType::MySQL,
            DbConnection::Postgres(_) => DatabaseType::PostgreSQL,
            DbConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Mutable access to the engine-specific connection.
    pub fn connection_mut(&mut self) -> &mut DbConnection {
        &mut self.conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.counters.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Point-in-time view of the pool, used by tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub connected: bool,
    /// Connections handed out since the manager was created
    pub borrowed_total: u64,
    /// Connections currently borrowed and not yet released
    pub in_use: usize,
    /// Open connections
    pub size: u32,
    pub idle: usize,
    pub max_size: u32,
}

/// Owner of the process-wide connection pool.
#[derive(Debug)]
pub struct PoolManager {
    config: PoolConfig,
    pool: RwLock<Option<DbPool>>,
    counters: Arc<PoolCounters>,
    shut_down: AtomicBool,
}

impl PoolManager {
    /// Create a manager in the Unconnected state. No I/O happens here.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
            counters: Arc::new(PoolCounters::default()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Get the configuration this manager was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Create the pool if it does not exist yet.
    ///
    /// Idempotent: concurrent first calls create exactly one pool, later calls
    /// return immediately. After [`shutdown`](Self::shutdown) this fails with a
    /// connection error instead of reconnecting.
    pub async fn connect(&self) -> DbResult<()> {
        self.ensure_open()?;

        // Early check without taking the write lock
        {
            let pool = self.pool.read().await;
            if pool.is_some() {
                return Ok(());
            }
        }

        let mut slot = self.pool.write().await;

        // Re-check under the write lock: another caller may have won the race
        if slot.is_some() {
            return Ok(());
        }
        self.ensure_open()?;

        let pool = self.create_pool().await?;
        *slot = Some(pool);
        Ok(())
    }

    /// Borrow a connection, creating the pool first if needed.
    ///
    /// Waits for a free connection when the pool is exhausted, up to the
    /// configured acquire timeout.
    pub async fn get_connection(&self) -> DbResult<PooledConnection> {
        self.connect().await?;

        let pool = self
            .pool
            .read()
            .await
            .clone()
            .ok_or_else(Self::shut_down_error)?;

        let conn = match &pool {
            DbPool::MySql(p) => p.acquire().await.map(DbConnection::MySql),
            DbPool::Postgres(p) => p.acquire().await.map(DbConnection::Postgres),
            DbPool::SQLite(p) => p.acquire().await.map(DbConnection::SQLite),
        }
        .map_err(|e| {
            warn!(error = %e, "Failed to acquire connection");
            DbError::connection(format!("Failed to acquire a pooled connection: {}", e))
        })?;

        debug!(in_use = self.in_use() + 1, "Borrowed connection");
        Ok(PooledConnection::new(conn, Arc::clone(&self.counters)))
    }

    /// Close the pool and move to the Closed state.
    ///
    /// Safe to call repeatedly and when the pool was never created. Errors
    /// during close are logged, never returned.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!("Pool manager already shut down");
            return;
        }

        let pool = self.pool.write().await.take();
        let Some(pool) = pool else {
            info!("Pool manager shut down (pool was never created)");
            return;
        };

        info!(engine = %pool.db_type(), "Closing connection pool");
        if tokio::time::timeout(SHUTDOWN_GRACE, pool.close())
            .await
            .is_err()
        {
            warn!(
                in_use = self.in_use(),
                "Timed out waiting for borrowed connections while closing pool"
            );
        }
        info!("Connection pool closed");
    }

    /// Check whether the pool currently exists.
    pub async fn is_connected(&self) -> bool {
        self.pool.read().await.is_some()
    }

    /// Snapshot of pool usage.
    pub async fn stats(&self) -> PoolStats {
        let pool = self.pool.read().await;
        PoolStats {
            connected: pool.is_some(),
            borrowed_total: self.counters.borrowed_total.load(Ordering::Relaxed),
            in_use: self.in_use(),
            size: pool.as_ref().map(DbPool::size).unwrap_or(0),
            idle: pool.as_ref().map(DbPool::num_idle).unwrap_or(0),
            max_size: self.config.pool_size(),
        }
    }

    fn in_use(&self) -> usize {
        self.counters.in_use.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Self::shut_down_error());
        }
        Ok(())
    }

    fn shut_down_error() -> DbError {
        DbError::connection("pool manager is shut down")
    }

    /// Create the connection pool. Opens one connection eagerly so bad
    /// settings surface here rather than on first use.
    async fn create_pool(&self) -> DbResult<DbPool> {
        let config = &self.config;
        let engine = config.engine();
        let acquire_timeout = Duration::from_secs(config.acquire_timeout_seconds());

        info!(
            engine = %engine,
            host = %config.host(),
            port = config.port(),
            database = %config.database(),
            pool_size = config.pool_size(),
            "Creating connection pool"
        );

        let pool = match engine {
            DatabaseType::MySQL => {
                let mut options = MySqlConnectOptions::new()
                    .host(config.host())
                    .port(config.port())
                    .username(config.user())
                    .password(config.password())
                    .charset("utf8mb4");
                if !config.database().is_empty() {
                    options = options.database(config.database());
                }

                MySqlPoolOptions::new()
                    .max_connections(config.pool_size())
                    .acquire_timeout(acquire_timeout)
                    .test_before_acquire(true)
                    .connect_with(options)
                    .await
                    .map(DbPool::MySql)
            }
            DatabaseType::PostgreSQL => {
                let mut options = PgConnectOptions::new()
                    .host(config.host())
                    .port(config.port())
                    .username(config.user())
                    .password(config.password());
                if !config.database().is_empty() {
                    options = options.database(config.database());
                }

                PgPoolOptions::new()
                    .max_connections(config.pool_size())
                    .acquire_timeout(acquire_timeout)
                    .test_before_acquire(true)
                    .connect_with(options)
                    .await
                    .map(DbPool::Postgres)
            }
            DatabaseType::SQLite => {
                let options = SqliteConnectOptions::new()
                    .filename(config.database())
                    .create_if_missing(false)
                    .read_only(true);

                SqlitePoolOptions::new()
                    .max_connections(config.pool_size())
                    .acquire_timeout(acquire_timeout)
                    .connect_with(options)
                    .await
                    .map(DbPool::SQLite)
            }
        }
        .map_err(|e| {
            warn!(engine = %engine, error = %e, "Failed to create connection pool");
            DbError::connection(format!(
                "{}. {}",
                e,
                connection_suggestion(engine, &e)
            ))
        })?;

        info!(engine = %engine, "Connection pool created");
        Ok(pool)
    }
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("access denied")
        || error_str.contains("authentication")
        || error_str.contains("password")
    {
        return "Verify the database user and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    match db_type {
        DatabaseType::SQLite => {
            "Verify the database file exists and is readable".to_string()
        }
        _ => format!("Verify the {} host, port and credentials", db_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sqlite_config(path: &str) -> PoolConfig {
        PoolConfig::builder(DatabaseType::SQLite)
            .database(path)
            .pool_size(2)
            .acquire_timeout_seconds(2)
            .build()
            .unwrap()
    }

    async fn sqlite_fixture() -> (TempDir, String) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pool.db");
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.unwrap();
        sqlx::query("CREATE TABLE t (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
        let path = path.to_string_lossy().into_owned();
        (dir, path)
    }

    #[tokio::test]
    async fn test_new_manager_is_unconnected() {
        let manager = PoolManager::new(sqlite_config("/nonexistent/never.db"));
        assert!(!manager.is_connected().await);
        let stats = manager.stats().await;
        assert!(!stats.connected);
        assert_eq!(stats.borrowed_total, 0);
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.max_size, 2);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (_dir, path) = sqlite_fixture().await;
        let manager = PoolManager::new(sqlite_config(&path));

        manager.connect().await.unwrap();
        manager.connect().await.unwrap();
        assert!(manager.is_connected().await);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_connect_creates_one_pool() {
        let (_dir, path) = sqlite_fixture().await;
        let manager = Arc::new(PoolManager::new(sqlite_config(&path)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.connect().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stats = manager.stats().await;
        assert!(stats.connected);
        assert!(stats.size <= 2);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_missing_file_fails_and_stays_unconnected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.db");
        let manager = PoolManager::new(sqlite_config(&path.to_string_lossy()));

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
        assert!(!manager.is_connected().await);
        // Read-only pools never create the file
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_connection_guard_updates_counters() {
        let (_dir, path) = sqlite_fixture().await;
        let manager = PoolManager::new(sqlite_config(&path));

        let conn = manager.get_connection().await.unwrap();
        assert_eq!(conn.db_type(), DatabaseType::SQLite);
        let stats = manager.stats().await;
        assert_eq!(stats.borrowed_total, 1);
        assert_eq!(stats.in_use, 1);

        drop(conn);
        let stats = manager.stats().await;
        assert_eq!(stats.borrowed_total, 1);
        assert_eq!(stats.in_use, 0);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_exhausted_pool_times_out_as_connection_error() {
        let (_dir, path) = sqlite_fixture().await;
        let config = PoolConfig::builder(DatabaseType::SQLite)
            .database(&path)
            .pool_size(1)
            .acquire_timeout_seconds(1)
            .build()
            .unwrap();
        let manager = PoolManager::new(config);

        let _held = manager.get_connection().await.unwrap();
        let err = manager.get_connection().await.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_final() {
        let (_dir, path) = sqlite_fixture().await;
        let manager = PoolManager::new(sqlite_config(&path));
        manager.connect().await.unwrap();

        manager.shutdown().await;
        manager.shutdown().await;
        assert!(!manager.is_connected().await);

        let err = manager.get_connection().await.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
        assert!(err.to_string().contains("shut down"));
    }

    #[tokio::test]
    async fn test_shutdown_without_pool() {
        let manager = PoolManager::new(sqlite_config("/nonexistent/never.db"));
        manager.shutdown().await;
        assert!(matches!(
            manager.connect().await,
            Err(DbError::Connection { .. })
        ));
    }

    #[test]
    fn test_connection_suggestion() {
        let err = sqlx::Error::Configuration("connection refused".into());
        assert!(connection_suggestion(DatabaseType::MySQL, &err).contains("running"));

        let err = sqlx::Error::Configuration("something else".into());
        assert!(connection_suggestion(DatabaseType::SQLite, &err).contains("file"));
    }
}
