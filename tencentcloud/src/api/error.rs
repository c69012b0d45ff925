use thiserror::Error;

/// Error codes that signal a transient condition on the Tencent Cloud side.
/// Calls failing with one of these are retried until the policy times out.
const RETRYABLE_CODES: &[&str] = &[
    "InternalError",
    "InternalError.UnknownError",
    "RequestLimitExceeded",
    "RequestLimitExceeded.UinLimitExceeded",
    "ResourceInUse",
    "ResourceBusy",
    "ResourceUnavailable",
    "FailedOperation.ResourceBusy",
    "FailedOperation.TaskRunning",
    "FailedOperation.OperationConflict",
    "OperationDenied.ResourceBusy",
    "InvalidParameterValue.InProcessing",
    "UnsupportedOperation.IncorrectStatus",
];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("[TencentCloudSDKError] Code={code}, Message={message}, RequestId={request_id}")]
    Api {
        code: String,
        message: String,
        request_id: String,
    },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    InvalidId(String),

    #[error("{0}")]
    Validation(String),

    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl ApiError {
    /// Vendor error code, when the failure came back in a response envelope
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Http { status, .. } => *status == 429 || *status >= 500,
            ApiError::Api { code, .. } => {
                RETRYABLE_CODES.contains(&code.as_str())
                    || code.ends_with(".InOperation")
                    || code.ends_with("ResourceBusy")
            }
            _ => false,
        }
    }

    /// True when the error means the addressed object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::Api { code, .. } => {
                code.starts_with("ResourceNotFound")
                    || code.ends_with("NotFound")
                    || code.ends_with("NotExist")
                    || code.ends_with("NotExists")
            }
            _ => false,
        }
    }
}
