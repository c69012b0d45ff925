pub mod cdn;
pub mod clb;
pub mod client;
pub mod error;
pub mod ids;
pub mod retry;
pub mod signing;
pub mod state_change;
pub mod tag;
pub mod tcr;
pub mod tdmq;
pub mod vpc;

#[cfg(test)]
pub mod test_helpers;

pub use client::{Client, ClientConfig, Product};
pub use error::ApiError;
pub use retry::{retry, OperationClass, RetryError, RetryPolicy};
pub use signing::Credential;
pub use state_change::StateChangeConf;

/// Some Tencent Cloud fields come back as `null` instead of being empty
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    let value: Option<T> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
