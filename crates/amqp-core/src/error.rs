//! Error types for AMQP instance reconciliation
//!
//! Every variant raised after a remote call carries the action name and,
//! where one exists, an echo of the request and response so failures can be
//! diagnosed from the error alone.

use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the reconciliation library
#[derive(Error, Debug)]
pub enum Error {
    /// Declared configuration is invalid; raised before any remote call
    #[error("Configuration error: {0}")]
    Config(String),

    /// Retry budget exhausted while the remote side kept failing transiently
    #[error("{action} timed out after {elapsed_secs}s of retrying, last error: {last_error}")]
    Timeout {
        /// Remote action or wait that timed out
        action: String,
        /// Whole seconds spent before giving up
        elapsed_secs: u64,
        /// Last failure observed before the deadline
        last_error: String,
    },

    /// Region mismatch persisted after switching to the alternate endpoint
    #[error("{action} is not applicable in either endpoint: {message} (request: {request})")]
    RegionMismatch {
        /// Remote action
        action: String,
        /// Provider message
        message: String,
        /// Request echo
        request: String,
    },

    /// Non-retryable failure returned by the remote API
    #[error("{action} failed with {code}: {message} (request: {request})")]
    Api {
        /// Remote action
        action: String,
        /// Provider error code
        code: String,
        /// Provider message
        message: String,
        /// Request echo
        request: String,
    },

    /// Transport succeeded but the response code was not `Success`
    #[error("{action} failed with response code {code}, response: {response} (request: {request})")]
    Application {
        /// Remote action
        action: String,
        /// Response-level code
        code: String,
        /// Request echo
        request: String,
        /// Response echo
        response: String,
    },

    /// Instance reached a terminal failure status while waiting for readiness
    #[error("Instance {instance_id} entered failure status {status}")]
    ReadinessFailed {
        /// Instance identity
        instance_id: String,
        /// Observed terminal status
        status: String,
    },

    /// Remote object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors (configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a readiness failure error
    pub fn readiness_failed(instance_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::ReadinessFailed {
            instance_id: instance_id.into(),
            status: status.into(),
        }
    }

    /// Whether this error means the remote object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error is a retry or wait deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
