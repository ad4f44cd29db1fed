//! Worker pool for per-table download tasks
//!
//! The packager submits one future per table and joins them all. The pool
//! contract is deliberately small: run every future to completion, return
//! the outcomes in no particular order. Pool size is a throughput knob, not
//! a correctness concern.

use crate::error::{Error, Result};
use crate::tasks::TaskOutcome;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A boxed per-table task future, as submitted to the pool
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'static>>;

/// Executes a batch of task futures and returns their outcomes
#[async_trait]
pub trait WorkerPool: Send + Sync {
    /// Run every future to completion. Outcome order is unspecified.
    async fn run_all(&self, tasks: Vec<TaskFuture>) -> Result<Vec<TaskOutcome>>;
}

/// [`WorkerPool`] running tasks on tokio, gated by a semaphore
pub struct BoundedWorkerPool {
    max_concurrent: usize,
}

impl BoundedWorkerPool {
    /// Create a pool running at most `max_concurrent` tasks at a time.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }
}

#[async_trait]
impl WorkerPool for BoundedWorkerPool {
    async fn run_all(&self, tasks: Vec<TaskFuture>) -> Result<Vec<TaskOutcome>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut join_set = JoinSet::new();

        for task in tasks {
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                // The semaphore is never closed, so acquisition only fails
                // if the pool itself is torn down mid-run.
                let _permit = semaphore.acquire_owned().await.ok();
                task.await
            });
        }

        let mut outcomes = Vec::with_capacity(join_set.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => return Err(Error::Internal(format!("worker task panicked: {e}"))),
            }
        }
        Ok(outcomes)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn outcome(table_id: &str) -> TaskOutcome {
        TaskOutcome::Survey {
            table_id: table_id.to_string(),
            result: Ok(std::path::PathBuf::from(format!("{table_id}.csv"))),
        }
    }

    #[tokio::test]
    async fn runs_every_task_and_returns_all_outcomes() {
        let pool = BoundedWorkerPool::new(2);
        let tasks: Vec<TaskFuture> = (0..5)
            .map(|index| {
                let id = format!("table-{index}");
                Box::pin(async move { outcome(&id) }) as TaskFuture
            })
            .collect();

        let outcomes = pool.run_all(tasks).await.unwrap();
        assert_eq!(outcomes.len(), 5);

        let mut ids: Vec<String> = outcomes
            .into_iter()
            .map(|outcome| match outcome {
                TaskOutcome::Survey { table_id, .. } => table_id,
                TaskOutcome::Table { table_id, .. } => table_id,
            })
            .collect();
        ids.sort();
        assert_eq!(
            ids,
            ["table-0", "table-1", "table-2", "table-3", "table-4"]
        );
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_pool_size() {
        let pool = BoundedWorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<TaskFuture> = (0..6)
            .map(|index| {
                let running = running.clone();
                let peak = peak.clone();
                let id = format!("table-{index}");
                Box::pin(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    outcome(&id)
                }) as TaskFuture
            })
            .collect();

        pool.run_all(tasks).await.unwrap();
        assert!(
            peak.load(Ordering::SeqCst) <= 2,
            "peak concurrency was {}",
            peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_outcomes() {
        let pool = BoundedWorkerPool::new(4);
        let outcomes = pool.run_all(Vec::new()).await.unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn zero_pool_size_is_clamped_to_one() {
        let pool = BoundedWorkerPool::new(0);
        let outcomes = pool
            .run_all(vec![Box::pin(async { outcome("only") }) as TaskFuture])
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
    }
}
