// # Alibaba Cloud Transport
//
// This crate provides the HTTP transport that delivers reconciliation
// requests to the Alibaba Cloud BSS OpenAPI and the AMQP open API.
//
// ## What it does
//
// - Makes one HTTP request per `call` (the invoker owns retries and endpoint swaps)
// - Encodes requests RPC-style: `Action`, `Version`, `Format` plus flattened parameters
// - Maps HTTP status codes and error documents to `CallError`
// - HTTP timeout configured (30 seconds by default)
//
// ## What it does not do
//
// - Retry, back off or switch endpoints (owned by `RetryingInvoker`)
// - Inspect the response-level `Code` of a 200 answer (owned by `ensure_success`)
// - Compute signatures: callers plug a `RequestSigner` in
//
// ## Security Requirements
//
// - Credentials held by a signer NEVER appear in logs or `Debug` output
//
// ## API Reference
//
// - RPC-style request: `POST https://<endpoint>/` with form-encoded parameters
// - Error document: `{"Code": "...", "Message": "...", "RequestId": "..."}`

use amqp_core::traits::{ApiRequest, ApiTransport, CallError, value_text};
use amqp_core::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Response format requested from the provider
const RESPONSE_FORMAT: &str = "JSON";

/// Code used when an error answer carries no error document
const HTTP_ERROR_CODE: &str = "HttpError";

/// Adds authentication to an encoded request
///
/// `params` holds the complete, ordered query of one call. Implementations
/// append whatever their signing scheme requires (key id, nonce, timestamp,
/// signature).
pub trait RequestSigner: Send + Sync {
    /// Sign `params` in place
    fn sign(&self, method: &str, params: &mut Vec<(String, String)>) -> anyhow::Result<()>;

    /// Name used in logs and `Debug` output
    fn signer_name(&self) -> &'static str;
}

/// Signer that leaves requests untouched
///
/// For endpoints fronted by a signing gateway, and for local simulators.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSigner;

impl RequestSigner for PassthroughSigner {
    fn sign(&self, _method: &str, _params: &mut Vec<(String, String)>) -> anyhow::Result<()> {
        Ok(())
    }

    fn signer_name(&self) -> &'static str {
        "passthrough"
    }
}

/// Transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// URL scheme used to reach endpoints
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("amqp-reconcile/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl TransportConfig {
    /// Validate the transport settings
    pub fn validate(&self) -> Result<()> {
        if self.scheme != "https" && self.scheme != "http" {
            return Err(Error::config(format!(
                "Transport scheme must be http or https, got {}",
                self.scheme
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("Transport timeout_secs must be greater than 0"));
        }
        Ok(())
    }

    /// HTTP timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// reqwest-based transport for Alibaba Cloud RPC-style APIs
///
/// # Security
///
/// The Debug implementation shows only the signer's name.
pub struct AlicloudTransport {
    /// HTTP client for API requests
    client: reqwest::Client,

    /// Adds authentication to each request
    signer: Arc<dyn RequestSigner>,

    /// Transport settings
    config: TransportConfig,
}

impl std::fmt::Debug for AlicloudTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlicloudTransport")
            .field("signer", &self.signer.signer_name())
            .field("config", &self.config)
            .finish()
    }
}

impl AlicloudTransport {
    /// Create a transport with default settings
    pub fn new(signer: Arc<dyn RequestSigner>) -> Result<Self> {
        Self::with_config(signer, TransportConfig::default())
    }

    /// Create a transport with explicit settings
    pub fn with_config(signer: Arc<dyn RequestSigner>, config: TransportConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            signer,
            config,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}://{}/", self.config.scheme, endpoint)
    }
}

#[async_trait]
impl ApiTransport for AlicloudTransport {
    async fn call(&self, endpoint: &str, request: &ApiRequest) -> std::result::Result<Value, CallError> {
        let mut params = encode_request(request);
        self.signer
            .sign("POST", &mut params)
            .map_err(|e| CallError::api("SigningFailed", e.to_string()))?;

        tracing::debug!(
            endpoint,
            action = %request.action,
            parameters = params.len(),
            "Sending RPC request"
        );

        let response = self
            .client
            .post(self.url(endpoint))
            .form(&params)
            .send()
            .await
            .map_err(|e| CallError::Network(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CallError::Network(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            CallError::api(
                "InvalidResponse",
                format!("Failed to parse response of {}: {}", request.action, e),
            )
        })
    }

    fn transport_name(&self) -> &'static str {
        "alicloud"
    }
}

/// Encode a request as an ordered RPC query
///
/// Lists of objects flatten to `Name.<n>.<Key>`, scalar lists to
/// `Name.<n>`, counting from 1.
pub fn encode_request(request: &ApiRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("Action".to_string(), request.action.clone()),
        ("Version".to_string(), request.version.clone()),
        ("Format".to_string(), RESPONSE_FORMAT.to_string()),
    ];
    for (key, value) in &request.params {
        flatten(key, value, &mut params);
    }
    params
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten(&format!("{}.{}", prefix, index + 1), item, out);
            }
        }
        Value::Object(fields) => {
            for (key, field) in fields {
                flatten(&format!("{}.{}", prefix, key), field, out);
            }
        }
        Value::Null => {}
        scalar => out.push((prefix.to_string(), value_text(scalar))),
    }
}

/// Map an error answer to a [`CallError`]
///
/// Uses the provider's error document when the body carries one, and a
/// generic HTTP error otherwise. The HTTP status is kept for classification.
pub fn parse_error(status: u16, body: &str) -> CallError {
    let document: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        document
            .as_ref()
            .map(|doc| value_text(&doc[name]))
            .filter(|text| !text.is_empty())
    };

    match field("Code") {
        Some(code) => CallError::Api {
            code,
            message: field("Message").unwrap_or_default(),
            http_status: Some(status),
            request_id: field("RequestId"),
        },
        None => CallError::Api {
            code: HTTP_ERROR_CODE.to_string(),
            message: format!("HTTP {}: {}", status, body.trim()),
            http_status: Some(status),
            request_id: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqp_core::traits::{ErrorClass, Service, classify};
    use serde_json::json;

    struct SecretSigner {
        access_key_secret: String,
    }

    impl RequestSigner for SecretSigner {
        fn sign(&self, _method: &str, params: &mut Vec<(String, String)>) -> anyhow::Result<()> {
            params.push(("Signature".to_string(), format!("sig-{}", self.access_key_secret.len())));
            Ok(())
        }

        fn signer_name(&self) -> &'static str {
            "secret"
        }
    }

    fn pairs(params: &[(String, String)]) -> Vec<(&str, &str)> {
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn test_encode_flattens_parameter_list() {
        let request = ApiRequest::new(Service::Billing, "CreateInstance", "2017-12-14")
            .param(
                "Parameter",
                json!([
                    {"Code": "Region", "Value": "cn-hangzhou"},
                    {"Code": "MaxTps", "Value": "1000"},
                ]),
            )
            .param("SubscriptionType", "Subscription")
            .param("Period", 12);

        let params = encode_request(&request);
        assert_eq!(
            pairs(&params),
            vec![
                ("Action", "CreateInstance"),
                ("Version", "2017-12-14"),
                ("Format", "JSON"),
                ("Parameter.1.Code", "Region"),
                ("Parameter.1.Value", "cn-hangzhou"),
                ("Parameter.2.Code", "MaxTps"),
                ("Parameter.2.Value", "1000"),
                ("SubscriptionType", "Subscription"),
                ("Period", "12"),
            ]
        );
    }

    #[test]
    fn test_encode_scalar_list_and_skips_null() {
        let request = ApiRequest::new(Service::Amqp, "ListInstances", "2019-12-12")
            .param("Tags", json!(["a", "b"]))
            .param("NextToken", Value::Null);

        let params = encode_request(&request);
        assert_eq!(
            &pairs(&params)[3..],
            &[("Tags.1", "a"), ("Tags.2", "b")]
        );
    }

    #[test]
    fn test_parse_error_document() {
        let err = parse_error(
            400,
            r#"{"Code":"NotApplicable","Message":"This API is not applicable for caller.","RequestId":"A1"}"#,
        );

        assert_eq!(err.code(), Some("NotApplicable"));
        assert_eq!(classify(&err), ErrorClass::RegionMismatch);
        match err {
            CallError::Api {
                http_status,
                request_id,
                ..
            } => {
                assert_eq!(http_status, Some(400));
                assert_eq!(request_id.as_deref(), Some("A1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_without_document_is_classified_by_status() {
        let unavailable = parse_error(503, "<html>Service Unavailable</html>");
        assert_eq!(unavailable.code(), Some(HTTP_ERROR_CODE));
        assert_eq!(classify(&unavailable), ErrorClass::Retryable);

        let forbidden = parse_error(403, "");
        assert_eq!(classify(&forbidden), ErrorClass::Fatal);
    }

    #[test]
    fn test_parse_error_throttling_code() {
        let err = parse_error(400, r#"{"Code":"Throttling.User","Message":"slow down"}"#);
        assert_eq!(classify(&err), ErrorClass::Retryable);
    }

    #[test]
    fn test_signer_secret_not_exposed_in_debug() {
        let transport = AlicloudTransport::new(Arc::new(SecretSigner {
            access_key_secret: "super_secret_key_12345".to_string(),
        }))
        .unwrap();

        let debug_str = format!("{:?}", transport);
        assert!(!debug_str.contains("super_secret_key_12345"));
        assert!(debug_str.contains("AlicloudTransport"));
        assert!(debug_str.contains("secret"));
    }

    #[test]
    fn test_config_validation() {
        assert!(TransportConfig::default().validate().is_ok());

        let config = TransportConfig {
            scheme: "ftp".to_string(),
            ..TransportConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TransportConfig {
            timeout_secs: 0,
            ..TransportConfig::default()
        };
        assert!(AlicloudTransport::with_config(Arc::new(PassthroughSigner), config).is_err());
    }

    #[test]
    fn test_url_uses_configured_scheme() {
        let config = TransportConfig {
            scheme: "http".to_string(),
            ..TransportConfig::default()
        };
        let transport = AlicloudTransport::with_config(Arc::new(PassthroughSigner), config).unwrap();

        assert_eq!(
            transport.url("business.aliyuncs.com"),
            "http://business.aliyuncs.com/"
        );
        assert_eq!(transport.transport_name(), "alicloud");
    }

    #[test]
    fn test_signer_appends_signature() {
        let request = ApiRequest::new(Service::Billing, "SetRenewal", "2017-12-14");
        let mut params = encode_request(&request);
        SecretSigner {
            access_key_secret: "abc".to_string(),
        }
        .sign("POST", &mut params)
        .unwrap();

        assert_eq!(params.last().map(|(k, _)| k.as_str()), Some("Signature"));
    }
}
