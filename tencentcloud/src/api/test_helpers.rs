//! Test helpers for the Tencent Cloud API

use std::time::Duration;

use super::client::{Client, ClientConfig};
use super::retry::RetryPolicy;
use super::signing::Credential;

/// Client pointed at a mock server, with retries short enough for tests
#[allow(clippy::disallowed_methods)]
pub fn create_test_client(url: &str) -> Client {
    let credential = Credential {
        secret_id: "AKIDTEST".to_string(),
        secret_key: "test-secret".to_string(),
        token: None,
    };
    let fast = RetryPolicy::with_timeout(Duration::from_secs(2))
        .with_backoff(Duration::from_millis(10), Duration::from_millis(50));
    Client::new(
        ClientConfig::new(credential, "ap-guangzhou")
            .with_endpoint(url)
            .with_retry_policies(fast.clone(), fast),
    )
    .unwrap()
}
