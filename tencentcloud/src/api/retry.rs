//! Retry-until-timeout with exponential backoff

use std::future::Future;
use std::time::{Duration, Instant};

use tfplug::Context;

use super::error::ApiError;

const READ_RETRY_TIMEOUT: Duration = Duration::from_secs(3 * 60);
const WRITE_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn read() -> Self {
        Self::with_timeout(READ_RETRY_TIMEOUT)
    }

    pub fn write() -> Self {
        Self::with_timeout(WRITE_RETRY_TIMEOUT)
    }

    pub fn for_class(class: OperationClass) -> Self {
        match class {
            OperationClass::Read => Self::read(),
            OperationClass::Write => Self::write(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_backoff)
    }
}

/// Outcome of one attempt that did not succeed
#[derive(Debug)]
pub enum RetryError {
    Retryable(ApiError),
    NonRetryable(ApiError),
}

impl RetryError {
    pub fn into_inner(self) -> ApiError {
        match self {
            RetryError::Retryable(e) | RetryError::NonRetryable(e) => e,
        }
    }
}

/// Classify by the error itself, so closures can use `?` on API calls
impl From<ApiError> for RetryError {
    fn from(error: ApiError) -> Self {
        if error.is_retryable() {
            RetryError::Retryable(error)
        } else {
            RetryError::NonRetryable(error)
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, the policy times out or
/// the context is cancelled. On timeout the last transient error is wrapped.
pub async fn retry<T, F, Fut>(ctx: &Context, policy: &RetryPolicy, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let started = Instant::now();
    let mut backoff = policy.initial_backoff;
    let mut attempt: u32 = 0;

    loop {
        if ctx.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        attempt += 1;

        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(e)) => return Err(e),
            Err(RetryError::Retryable(e)) => e,
        };

        if started.elapsed() + backoff > policy.timeout {
            return Err(ApiError::Timeout(format!(
                "gave up after {} attempts in {:?}: {}",
                attempt,
                started.elapsed(),
                error
            )));
        }

        tracing::debug!(
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %error,
            "retrying after transient error"
        );

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = ctx.cancelled() => return Err(ApiError::Cancelled),
        }
        backoff = policy.next_backoff(backoff);
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn busy() -> ApiError {
        ApiError::Api {
            code: "FailedOperation.ResourceBusy".to_string(),
            message: "busy".to_string(),
            request_id: "r".to_string(),
        }
    }

    fn fast(timeout_ms: u64) -> RetryPolicy {
        RetryPolicy::with_timeout(Duration::from_millis(timeout_ms))
            .with_backoff(Duration::from_millis(5), Duration::from_millis(20))
    }

    #[test]
    fn operation_classes_map_to_timeouts() {
        assert_eq!(RetryPolicy::read().timeout, Duration::from_secs(180));
        assert_eq!(RetryPolicy::write().timeout, Duration::from_secs(300));
        assert_eq!(
            RetryPolicy::for_class(OperationClass::Write).timeout,
            RetryPolicy::write().timeout
        );
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = fast(1000);
        let b1 = policy.next_backoff(policy.initial_backoff);
        assert_eq!(b1, Duration::from_millis(10));
        let b2 = policy.next_backoff(Duration::from_millis(15));
        assert_eq!(b2, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry(&Context::new(), &fast(1000), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(busy().into())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry(&Context::new(), &fast(1000), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RetryError::NonRetryable(ApiError::Validation("bad".into())))
        })
        .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn times_out_with_last_error() {
        let result: Result<(), _> = retry(&Context::new(), &fast(30), || async {
            Err(RetryError::Retryable(busy()))
        })
        .await;

        match result {
            Err(ApiError::Timeout(message)) => assert!(message.contains("ResourceBusy")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancelled_context_aborts() {
        let ctx = Context::new();
        ctx.cancel();
        let result: Result<(), _> = retry(&ctx, &fast(1000), || async { Ok(()) }).await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }
}
