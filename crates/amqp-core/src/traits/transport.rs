// # API Transport Trait
//
// Defines the boundary to the provider's RPC-style HTTP APIs.
//
// ## Implementations
//
// - Alibaba Cloud: `amqp-provider-alicloud` crate
// - Tests: scripted in-memory transports
//
// ## Usage
//
// ```rust,ignore
// use amqp_core::traits::{ApiRequest, ApiTransport, Service};
//
// let request = ApiRequest::new(Service::Billing, "QueryAvailableInstances", "2017-12-14")
//     .param("InstanceIDs", "amqp-123");
// let response = transport.call("business.aliyuncs.com", &request).await?;
// ```

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Remote API family a request is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Billing and provisioning (BSS OpenAPI)
    Billing,
    /// AMQP instance inventory (AMQP open API)
    Amqp,
}

impl Service {
    /// Short name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Billing => "bss",
            Service::Amqp => "amqp",
        }
    }
}

/// A single RPC-style request
///
/// `params` keeps insertion order so the request echo in errors and logs
/// reads the way it was built.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Target API family
    pub service: Service,
    /// Action name (e.g. `CreateInstance`)
    pub action: String,
    /// Fixed API version string
    pub version: String,
    /// Top-level request parameters
    pub params: Map<String, Value>,
}

impl ApiRequest {
    /// Create an empty request for an action
    pub fn new(service: Service, action: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service,
            action: action.into(),
            version: version.into(),
            params: Map::new(),
        }
    }

    /// Add a top-level parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a top-level parameter in place
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    /// Look up a top-level parameter
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// The `Parameter` list as `(Code, Value)` pairs, in order
    pub fn parameter_list(&self) -> Vec<(String, String)> {
        self.params
            .get("Parameter")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        (
                            entry["Code"].as_str().unwrap_or_default().to_string(),
                            value_text(&entry["Value"]),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Compact JSON echo of the parameters for diagnostics
    pub fn echo(&self) -> String {
        Value::Object(self.params.clone()).to_string()
    }
}

/// Render a scalar JSON value the way the provider expects it on the wire
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Failure of a single remote call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Connection, DNS, TLS or timeout failure before a response was read
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with an error document
    #[error("{code}: {message}")]
    Api {
        /// Provider error code
        code: String,
        /// Provider message
        message: String,
        /// HTTP status, when known
        http_status: Option<u16>,
        /// Provider request id, when returned
        request_id: Option<String>,
    },
}

impl CallError {
    /// Create an API error with no HTTP context
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
            http_status: None,
            request_id: None,
        }
    }

    /// Provider error code, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            CallError::Api { code, .. } => Some(code),
            CallError::Network(_) => None,
        }
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        match self {
            CallError::Api { message, .. } => message,
            CallError::Network(message) => message,
        }
    }
}

/// How the invoker should react to a [`CallError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Back off and try again until the deadline
    Retryable,
    /// Switch to the alternate endpoint and try again
    RegionMismatch,
    /// The addressed object does not exist
    NotFound,
    /// Give up immediately
    Fatal,
}

const RETRYABLE_CODES: &[&str] = &[
    "ServiceUnavailable",
    "SystemBusy",
    "InternalError",
    "ServiceTimeout",
    "UnknownError",
];

const REGION_MISMATCH_CODE: &str = "NotApplicable";

const NOT_FOUND_CODES: &[&str] = &["InstanceNotFound", "InvalidInstanceId.NotFound"];

/// Classify a call failure
pub fn classify(error: &CallError) -> ErrorClass {
    match error {
        CallError::Network(_) => ErrorClass::Retryable,
        CallError::Api {
            code, http_status, ..
        } => {
            if code == REGION_MISMATCH_CODE {
                ErrorClass::RegionMismatch
            } else if NOT_FOUND_CODES.contains(&code.as_str()) {
                ErrorClass::NotFound
            } else if code.starts_with("Throttling")
                || RETRYABLE_CODES.contains(&code.as_str())
                || matches!(http_status, Some(429) | Some(500..=599))
            {
                ErrorClass::Retryable
            } else {
                ErrorClass::Fatal
            }
        }
    }
}

/// Trait for transports that deliver [`ApiRequest`]s to the provider
///
/// # Responsibilities
///
/// A transport performs exactly one HTTP exchange per `call`. It signs,
/// encodes and sends the request and maps the reply to either the parsed
/// JSON body or a [`CallError`]. Retrying, endpoint switching and response
/// code checks belong to [`crate::invoker::RetryingInvoker`].
///
/// # Thread Safety
///
/// Implementations must be usable from concurrent reconciliations.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Deliver one request to `endpoint` (a host name such as
    /// `business.aliyuncs.com`)
    async fn call(&self, endpoint: &str, request: &ApiRequest) -> Result<Value, CallError>;

    /// Transport name (for logging)
    fn transport_name(&self) -> &'static str;
}
