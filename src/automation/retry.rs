//! Interval/deadline polling
//!
//! Discovery, waits and readiness checks all poll something until it holds
//! or a wall-clock budget runs out. The timing lives here, on tokio's clock,
//! so tests can run it under a paused clock.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

/// Poll every `interval` until `timeout` has elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_millis(interval_ms: u64, timeout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    /// Same interval, budget capped at whatever is left before `deadline`
    pub fn until(self, deadline: Instant) -> Self {
        Self {
            interval: self.interval,
            timeout: deadline.saturating_duration_since(Instant::now()),
        }
    }

    /// Run `attempt` until it yields `Some`, or the budget is spent.
    ///
    /// The first attempt runs immediately. Each attempt only gets the time
    /// left before the deadline; a slow one is dropped when it runs out. The
    /// sleep before the next attempt never overshoots the deadline, and one
    /// last attempt is made at the deadline itself.
    pub async fn poll<T, F, Fut>(&self, mut attempt: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if let Ok(Some(value)) = timeout(left, attempt()).await {
                return Some(value);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            sleep(self.interval.min(deadline - now)).await;
        }
    }

    /// Poll a boolean condition; true as soon as it holds
    pub async fn poll_until<F, Fut>(&self, mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        self.poll(|| {
            let fut = check();
            async move { fut.await.then_some(()) }
        })
        .await
        .is_some()
    }
}
