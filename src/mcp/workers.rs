//! Bounded worker tasks for tool execution.
//!
//! Each tool invocation runs on its own spawned task so the dispatch loop
//! never waits on the database. A semaphore bounds how many invocations run
//! at once; further invocations wait for a permit.

use crate::error::{DbError, DbResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::error;

/// Default bound on concurrently running query workers.
pub const DEFAULT_MAX_WORKERS: usize = 32;

#[derive(Debug, Clone)]
pub struct QueryWorkers {
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl QueryWorkers {
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Permits not currently held by a running worker.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `task` on a worker and wait for its output.
    ///
    /// A panic inside the task is caught and reported as an unexpected error
    /// carrying the panic message.
    pub async fn run<F, T>(&self, task: F) -> DbResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| DbError::unexpected("query worker pool is closed"))?;

        let handle = tokio::spawn(async move {
            let _permit = permit;
            task.await
        });

        handle.await.map_err(join_error)
    }
}

impl Default for QueryWorkers {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

fn join_error(err: JoinError) -> DbError {
    if !err.is_panic() {
        return DbError::unexpected(format!("query worker was cancelled: {}", err));
    }

    let panic = err.into_panic();
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    };

    error!(panic = %message, "Query worker panicked");
    DbError::unexpected(format!("query worker panicked: {}", message))
}
