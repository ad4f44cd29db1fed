//! Bounded polling for remote asynchronous jobs
//!
//! The table service runs CSV exports and bulk attachment downloads as
//! asynchronous jobs: a start call returns a token, and a poll call either
//! yields the result, signals "not ready yet", or fails. [`JobPoller`]
//! drives any such job to completion with a bounded number of tries.

use crate::config::PollConfig;
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Outcome of a single poll attempt against a remote asynchronous job
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollState<T> {
    /// The job finished and produced a result
    Ready(T),
    /// The job is still running; poll again later
    NotReady,
}

/// Bounded-retry driver for remote asynchronous jobs
///
/// Each iteration sleeps first, then polls: the job was submitted a moment
/// ago, so an immediate poll would all but certainly come back not-ready.
/// A zero interval skips the sleep entirely (poll as fast as possible,
/// intended for tests). The total wait for one job is bounded by
/// `interval * max_tries`.
#[derive(Clone, Copy, Debug)]
pub struct JobPoller {
    interval: Duration,
    max_tries: u32,
}

impl JobPoller {
    /// Create a poller with an explicit interval and retry cap
    pub fn new(interval: Duration, max_tries: u32) -> Self {
        Self {
            interval,
            max_tries,
        }
    }

    /// Create a poller from the polling configuration
    pub fn from_config(config: &PollConfig) -> Self {
        Self::new(config.interval(), config.max_tries)
    }

    /// Drive `op` until it yields a result.
    ///
    /// `PollState::NotReady` consumes one try and loops; any error from the
    /// operation propagates immediately. When all tries are exhausted the
    /// call fails with [`Error::Timeout`].
    pub async fn poll<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollState<T>>>,
    {
        for attempt in 1..=self.max_tries {
            if !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }

            match op().await? {
                PollState::Ready(value) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "async job became ready");
                    }
                    return Ok(value);
                }
                PollState::NotReady => {
                    tracing::debug!(
                        attempt,
                        max_tries = self.max_tries,
                        "async job not ready yet"
                    );
                }
            }
        }

        tracing::warn!(
            max_tries = self.max_tries,
            interval_ms = self.interval.as_millis() as u64,
            "async job did not become ready within the retry budget"
        );
        Err(Error::Timeout {
            tries: self.max_tries,
        })
    }
}
