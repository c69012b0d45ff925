//! Polls a refresh function until a remote object reaches a target state

use std::future::Future;
use std::time::{Duration, Instant};

use tfplug::Context;

use super::error::ApiError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Interval between refreshes
    pub min_timeout: Duration,
    /// Consecutive "not found" refreshes tolerated while waiting for a target
    pub not_found_checks: u32,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            timeout,
            delay: Duration::ZERO,
            min_timeout: DEFAULT_POLL_INTERVAL,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.min_timeout = interval;
        self
    }

    /// Refresh until the returned state is one of `target`. `refresh` yields
    /// `None` when the object cannot be found.
    pub async fn wait_for_state<T, F, Fut>(&self, ctx: &Context, mut refresh: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(T, String)>, ApiError>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut not_found = 0u32;
        self.sleep(ctx, self.delay).await?;

        loop {
            match refresh().await {
                Ok(Some((value, state))) => {
                    not_found = 0;
                    if self.target.contains(&state) {
                        return Ok(value);
                    }
                    if !self.pending.contains(&state) {
                        return Err(ApiError::TaskFailed(format!(
                            "unexpected state '{}', wanted target '{}'",
                            state,
                            self.target.join(", ")
                        )));
                    }
                    tracing::debug!(state = %state, "waiting for state change");
                }
                Ok(None) => {
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(ApiError::TaskFailed(format!(
                            "couldn't find resource ({} retries)",
                            self.not_found_checks
                        )));
                    }
                }
                Err(e) if e.is_retryable() => {
                    tracing::debug!(error = %e, "transient error while polling state");
                }
                Err(e) => return Err(e),
            }

            if Instant::now() + self.min_timeout > deadline {
                return Err(ApiError::Timeout(format!(
                    "timeout while waiting for state to become '{}'",
                    self.target.join(", ")
                )));
            }
            self.sleep(ctx, self.min_timeout).await?;
        }
    }

    /// Refresh until the object is gone. Any state seen meanwhile counts as
    /// pending.
    pub async fn wait_for_absence<F, Fut>(&self, ctx: &Context, mut refresh: F) -> Result<(), ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<String>, ApiError>>,
    {
        let deadline = Instant::now() + self.timeout;
        self.sleep(ctx, self.delay).await?;

        loop {
            match refresh().await {
                Ok(None) => return Ok(()),
                Ok(Some(state)) => {
                    tracing::debug!(state = %state, "waiting for deletion");
                }
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(error = %e, "transient error while polling deletion");
                }
                Err(e) => return Err(e),
            }

            if Instant::now() + self.min_timeout > deadline {
                return Err(ApiError::Timeout(
                    "timeout while waiting for resource to be deleted".to_string(),
                ));
            }
            self.sleep(ctx, self.min_timeout).await?;
        }
    }

    async fn sleep(&self, ctx: &Context, duration: Duration) -> Result<(), ApiError> {
        if ctx.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = ctx.cancelled() => Err(ApiError::Cancelled),
        }
    }
}
