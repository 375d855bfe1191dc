//! Configuration types for the reconciler
//!
//! These settings are static per provider account: endpoints, product
//! identifiers, retry and polling cadence, deadlines, and the enumeration
//! tables used by the field translator. Declared instance attributes live in
//! [`crate::model`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Region the instances are provisioned in (e.g. "cn-hangzhou")
    pub region: String,

    /// Provider endpoints
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Fixed product identifiers and API versions
    #[serde(default)]
    pub product: ProductConfig,

    /// Backoff for retryable call failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Readiness polling after create
    #[serde(default)]
    pub poll: PollConfig,

    /// Per-operation deadlines
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Enumeration tables for request/response translation
    #[serde(default)]
    pub translation: TranslationConfig,
}

impl ReconcilerConfig {
    /// Create a configuration for a region with defaults everywhere else
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoints: EndpointConfig::default(),
            product: ProductConfig::default(),
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
            timeouts: TimeoutConfig::default(),
            translation: TranslationConfig::default(),
        }
    }

    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.region.trim().is_empty() {
            return Err(crate::Error::config("Region cannot be empty"));
        }

        self.endpoints.validate()?;
        self.product.validate()?;
        self.retry.validate()?;
        self.poll.validate()?;
        self.timeouts.validate()?;

        Ok(())
    }

    /// Endpoint of the AMQP inventory API for this region
    pub fn amqp_endpoint(&self) -> String {
        self.endpoints.amqp.replace("{region}", &self.region)
    }
}

/// Provider endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Billing API endpoint tried first
    #[serde(default = "default_billing_endpoint")]
    pub billing: String,

    /// Alternate billing endpoint used after a region mismatch
    #[serde(default = "default_billing_international_endpoint")]
    pub billing_international: String,

    /// AMQP inventory endpoint; `{region}` is substituted
    #[serde(default = "default_amqp_endpoint")]
    pub amqp: String,
}

impl EndpointConfig {
    /// Validate the endpoint configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (name, value) in [
            ("billing", &self.billing),
            ("billing_international", &self.billing_international),
            ("amqp", &self.amqp),
        ] {
            if value.trim().is_empty() {
                return Err(crate::Error::config(format!("Endpoint {name} cannot be empty")));
            }
            if value.contains("://") {
                return Err(crate::Error::config(format!(
                    "Endpoint {name} must be a host name without scheme, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            billing: default_billing_endpoint(),
            billing_international: default_billing_international_endpoint(),
            amqp: default_amqp_endpoint(),
        }
    }
}

fn default_billing_endpoint() -> String {
    "business.aliyuncs.com".to_string()
}

fn default_billing_international_endpoint() -> String {
    "business.ap-southeast-1.aliyuncs.com".to_string()
}

fn default_amqp_endpoint() -> String {
    "amqp-open.{region}.aliyuncs.com".to_string()
}

/// Fixed product identifiers and API versions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    /// Billing product code
    #[serde(default = "default_product_code")]
    pub product_code: String,

    /// Billing product type
    #[serde(default = "default_product_type")]
    pub product_type: String,

    /// Billing API version
    #[serde(default = "default_billing_api_version")]
    pub billing_api_version: String,

    /// AMQP inventory API version
    #[serde(default = "default_amqp_api_version")]
    pub amqp_api_version: String,
}

impl ProductConfig {
    /// Validate the product configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.product_code.is_empty() || self.product_type.is_empty() {
            return Err(crate::Error::config("Product code and type are required"));
        }
        if self.billing_api_version.is_empty() || self.amqp_api_version.is_empty() {
            return Err(crate::Error::config("API versions are required"));
        }
        Ok(())
    }
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            product_code: default_product_code(),
            product_type: default_product_type(),
            billing_api_version: default_billing_api_version(),
            amqp_api_version: default_amqp_api_version(),
        }
    }
}

fn default_product_code() -> String {
    "ons".to_string()
}

fn default_product_type() -> String {
    "ons_onsproxy_pre".to_string()
}

fn default_billing_api_version() -> String {
    "2017-12-14".to_string()
}

fn default_amqp_api_version() -> String {
    "2019-12-12".to_string()
}

/// Incremental backoff for retryable failures
///
/// The first wait is `base_delay_ms`; every later wait is longer by
/// `increment_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// First wait (in milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth of each subsequent wait (in milliseconds)
    #[serde(default = "default_increment_ms")]
    pub increment_ms: u64,
}

impl RetryConfig {
    /// Validate the retry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.base_delay_ms == 0 {
            return Err(crate::Error::config("Retry base delay must be > 0"));
        }
        Ok(())
    }

    /// First wait
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Growth per retry
    pub fn increment(&self) -> Duration {
        Duration::from_millis(self.increment_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            increment_ms: default_increment_ms(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    3_000
}

fn default_increment_ms() -> u64 {
    3_000
}

/// Readiness polling after create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between status reads (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Statuses that end the wait successfully
    #[serde(default = "default_ready_states")]
    pub ready_states: Vec<String>,

    /// Statuses that end the wait with an error
    #[serde(default = "default_failed_states")]
    pub failed_states: Vec<String>,
}

impl PollConfig {
    /// Validate the polling configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_ms == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.ready_states.is_empty() {
            return Err(crate::Error::config("At least one ready state is required"));
        }
        if let Some(state) = self
            .ready_states
            .iter()
            .find(|state| self.failed_states.contains(state))
        {
            return Err(crate::Error::config(format!(
                "State {state} cannot be both ready and failed"
            )));
        }
        Ok(())
    }

    /// Interval between status reads
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            ready_states: default_ready_states(),
            failed_states: default_failed_states(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_ready_states() -> Vec<String> {
    vec!["SERVING".to_string()]
}

fn default_failed_states() -> Vec<String> {
    vec!["Failed".to_string()]
}

/// Per-operation deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Budget for create, including the readiness wait (in seconds)
    #[serde(default = "default_create_timeout_secs")]
    pub create_secs: u64,

    /// Budget for each update request (in seconds)
    #[serde(default = "default_update_timeout_secs")]
    pub update_secs: u64,

    /// Budget for each read query (in seconds)
    #[serde(default = "default_read_timeout_secs")]
    pub read_secs: u64,
}

impl TimeoutConfig {
    /// Validate the timeout configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.create_secs == 0 || self.update_secs == 0 || self.read_secs == 0 {
            return Err(crate::Error::config("Timeouts must be > 0"));
        }
        Ok(())
    }

    /// Create budget
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    /// Update budget
    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update_secs)
    }

    /// Read budget
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            create_secs: default_create_timeout_secs(),
            update_secs: default_update_timeout_secs(),
            read_secs: default_read_timeout_secs(),
        }
    }
}

fn default_create_timeout_secs() -> u64 {
    3 * 60 * 60
}

fn default_update_timeout_secs() -> u64 {
    20 * 60
}

fn default_read_timeout_secs() -> u64 {
    5 * 60
}

/// Enumeration tables for the field translator
///
/// Each table is a list of `(local, remote)` pairs. Values missing from a
/// table pass through the translator unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Instance tier spellings
    #[serde(default = "default_tier_table")]
    pub tiers: Vec<(String, String)>,

    /// Renewal period unit spellings
    #[serde(default = "default_renewal_unit_table")]
    pub renewal_units: Vec<(String, String)>,

    /// Remote token sent when EIP support is enabled
    #[serde(default = "default_eip_enabled_token")]
    pub eip_enabled: String,

    /// Remote token sent when EIP support is disabled
    #[serde(default = "default_eip_disabled_token")]
    pub eip_disabled: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            tiers: default_tier_table(),
            renewal_units: default_renewal_unit_table(),
            eip_enabled: default_eip_enabled_token(),
            eip_disabled: default_eip_disabled_token(),
        }
    }
}

fn default_tier_table() -> Vec<(String, String)> {
    vec![
        ("professional".to_string(), "PROFESSIONAL".to_string()),
        ("vip".to_string(), "VIP".to_string()),
    ]
}

fn default_renewal_unit_table() -> Vec<(String, String)> {
    vec![
        ("Month".to_string(), "M".to_string()),
        ("Year".to_string(), "Y".to_string()),
    ]
}

fn default_eip_enabled_token() -> String {
    "eip_true".to_string()
}

fn default_eip_disabled_token() -> String {
    "eip_false".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_provider_constants() {
        let config = ReconcilerConfig::new("cn-hangzhou");

        assert_eq!(config.product.product_code, "ons");
        assert_eq!(config.product.product_type, "ons_onsproxy_pre");
        assert_eq!(config.product.billing_api_version, "2017-12-14");
        assert_eq!(config.timeouts.create(), Duration::from_secs(3 * 60 * 60));
        assert_eq!(config.poll.interval(), Duration::from_secs(5));
        assert_eq!(config.amqp_endpoint(), "amqp-open.cn-hangzhou.aliyuncs.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_region_is_rejected() {
        let config = ReconcilerConfig::new("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlapping_poll_states_are_rejected() {
        let mut config = ReconcilerConfig::new("cn-hangzhou");
        config.poll.failed_states.push("SERVING".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn endpoint_with_scheme_is_rejected() {
        let mut config = ReconcilerConfig::new("cn-hangzhou");
        config.endpoints.billing = "https://business.aliyuncs.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_json_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"region": "cn-shanghai", "poll": {{"interval_ms": 1000}}, "timeouts": {{"create_secs": 600}}}}"#
        )
        .unwrap();

        let config = ReconcilerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.region, "cn-shanghai");
        assert_eq!(config.poll.interval(), Duration::from_secs(1));
        assert_eq!(config.poll.ready_states, vec!["SERVING".to_string()]);
        assert_eq!(config.timeouts.create_secs, 600);
        assert_eq!(config.timeouts.update_secs, 20 * 60);
        assert_eq!(config.endpoints.billing, "business.aliyuncs.com");
    }

    #[test]
    fn invalid_json_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"region": "", "retry": {{"base_delay_ms": 0}}}}"#).unwrap();

        assert!(ReconcilerConfig::from_json_file(file.path()).is_err());
    }
}
