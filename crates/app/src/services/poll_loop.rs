//! Poll loop — runs an action on a fixed interval until cancelled.
//!
//! The action runs first, then the loop sleeps for the interval. There is no
//! backoff, jitter or overrun compensation, so consecutive invocations are
//! spaced by the interval plus the action's own run time. Action errors are
//! not retried here; they end the loop.

use std::future::Future;
use std::time::Duration;

use crate::shutdown::Shutdown;

/// Default polling period: 15 minutes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Fixed-interval driver for a periodic action.
#[derive(Debug, Clone)]
pub struct PollLoop {
    interval: Duration,
    shutdown: Shutdown,
}

impl PollLoop {
    pub fn new(interval: Duration, shutdown: Shutdown) -> Self {
        Self { interval, shutdown }
    }

    /// Invoke `action` until shutdown is requested.
    ///
    /// Returns the number of completed invocations when cancelled.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `action`, unchanged.
    #[tracing::instrument(skip_all, fields(interval_secs = self.interval.as_secs()))]
    pub async fn run_forever<F, Fut, E>(&self, mut action: F) -> Result<u64, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut iterations: u64 = 0;
        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            tracing::debug!(iteration = iterations + 1, "running poll action");
            action().await?;
            iterations += 1;

            if self
                .shutdown
                .run_until(tokio::time::sleep(self.interval))
                .await
                .is_none()
            {
                break;
            }
        }
        tracing::info!(iterations, "poll loop stopped");
        Ok(iterations)
    }
}
