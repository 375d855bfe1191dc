//! Declared and observed instance attributes
//!
//! [`InstanceConfig`] is the user's intended state in local vocabulary.
//! [`RemoteInstance`] and [`BillingAttributes`] are what the provider
//! reports, still in remote vocabulary. [`InstanceState`] is the local view
//! rebuilt from both by a read.

use serde::{Deserialize, Serialize};

/// Instance tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceTier {
    /// Professional edition
    Professional,
    /// VIP edition
    Vip,
}

impl InstanceTier {
    /// Local spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceTier::Professional => "professional",
            InstanceTier::Vip => "vip",
        }
    }
}

/// Payment type; only subscription billing is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentType {
    /// Prepaid subscription
    Subscription,
}

impl PaymentType {
    /// Local spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Subscription => "Subscription",
        }
    }
}

/// Unit of the renewal duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenewalDurationUnit {
    /// Months
    Month,
    /// Years
    Year,
}

impl RenewalDurationUnit {
    /// Local spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalDurationUnit::Month => "Month",
            RenewalDurationUnit::Year => "Year",
        }
    }
}

/// Renewal behaviour at the end of a subscription period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenewalStatus {
    /// Renew automatically
    AutoRenewal,
    /// Renew on request
    ManualRenewal,
    /// Let the subscription lapse
    NotRenewal,
}

impl RenewalStatus {
    /// Local spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalStatus::AutoRenewal => "AutoRenewal",
            RenewalStatus::ManualRenewal => "ManualRenewal",
            RenewalStatus::NotRenewal => "NotRenewal",
        }
    }
}

/// Direction hint for capacity changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifyType {
    /// Lower capacity
    Downgrade,
    /// Raise capacity
    Upgrade,
}

impl ModifyType {
    /// Local spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            ModifyType::Downgrade => "Downgrade",
            ModifyType::Upgrade => "Upgrade",
        }
    }
}

const ALLOWED_PERIODS: &[u32] = &[1, 2, 3, 6, 12, 24];
const ALLOWED_RENEWAL_DURATIONS: &[u32] = &[1, 2, 3, 6, 12];

/// Declared configuration of one managed AMQP instance
///
/// Quantities stay string-encoded because the provider accepts them as
/// strings and rejects reformatted numbers for some tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Tier; fixed after creation
    pub instance_type: InstanceTier,

    /// Peak messages per second
    pub max_tps: String,

    /// Peak public-network messages per second; only used with EIP support
    #[serde(default)]
    pub max_eip_tps: Option<String>,

    /// Maximum number of queues
    pub queue_capacity: String,

    /// Whether public network access is enabled
    pub support_eip: bool,

    /// Message storage size; ignored for the professional tier
    #[serde(default)]
    pub storage_size: Option<String>,

    /// Billing model
    pub payment_type: PaymentType,

    /// Initial subscription length in months (create only)
    #[serde(default)]
    pub period: Option<u32>,

    /// Auto-renewal length
    #[serde(default)]
    pub renewal_duration: Option<u32>,

    /// Auto-renewal length unit
    #[serde(default)]
    pub renewal_duration_unit: Option<RenewalDurationUnit>,

    /// Renewal behaviour
    #[serde(default)]
    pub renewal_status: Option<RenewalStatus>,

    /// Capacity change hint for updates
    #[serde(default)]
    pub modify_type: Option<ModifyType>,

    /// Logistics information forwarded at create
    #[serde(default)]
    pub logistics: Option<String>,
}

impl InstanceConfig {
    /// Create a configuration with the required attributes
    pub fn new(
        instance_type: InstanceTier,
        max_tps: impl Into<String>,
        queue_capacity: impl Into<String>,
        support_eip: bool,
    ) -> Self {
        Self {
            instance_type,
            max_tps: max_tps.into(),
            max_eip_tps: None,
            queue_capacity: queue_capacity.into(),
            support_eip,
            storage_size: None,
            payment_type: PaymentType::Subscription,
            period: None,
            renewal_duration: None,
            renewal_duration_unit: None,
            renewal_status: None,
            modify_type: None,
            logistics: None,
        }
    }

    /// Set the public-network throughput
    pub fn with_max_eip_tps(mut self, max_eip_tps: impl Into<String>) -> Self {
        self.max_eip_tps = Some(max_eip_tps.into());
        self
    }

    /// Set the storage size
    pub fn with_storage_size(mut self, storage_size: impl Into<String>) -> Self {
        self.storage_size = Some(storage_size.into());
        self
    }

    /// Set the initial subscription period
    pub fn with_period(mut self, period: u32) -> Self {
        self.period = Some(period);
        self
    }

    /// Set the renewal policy
    pub fn with_renewal(
        mut self,
        status: RenewalStatus,
        duration: Option<u32>,
        unit: Option<RenewalDurationUnit>,
    ) -> Self {
        self.renewal_status = Some(status);
        self.renewal_duration = duration;
        self.renewal_duration_unit = unit;
        self
    }

    /// Set the capacity change hint
    pub fn with_modify_type(mut self, modify_type: ModifyType) -> Self {
        self.modify_type = Some(modify_type);
        self
    }

    /// Validate attribute values that the type system does not cover
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_tps.trim().is_empty() {
            return Err(crate::Error::config("max_tps cannot be empty"));
        }
        if self.queue_capacity.trim().is_empty() {
            return Err(crate::Error::config("queue_capacity cannot be empty"));
        }
        if let Some(period) = self.period
            && !ALLOWED_PERIODS.contains(&period)
        {
            return Err(crate::Error::config(format!(
                "period must be one of {ALLOWED_PERIODS:?}, got {period}"
            )));
        }
        if let Some(duration) = self.renewal_duration
            && !ALLOWED_RENEWAL_DURATIONS.contains(&duration)
        {
            return Err(crate::Error::config(format!(
                "renewal_duration must be one of {ALLOWED_RENEWAL_DURATIONS:?}, got {duration}"
            )));
        }
        Ok(())
    }

    /// `max_eip_tps` when it is set to a non-empty value
    pub fn eip_throughput(&self) -> Option<&str> {
        present(&self.max_eip_tps)
    }

    /// `storage_size` when it is set to a non-empty value
    pub fn storage(&self) -> Option<&str> {
        present(&self.storage_size)
    }

    /// `logistics` when it is set to a non-empty value
    pub fn logistics_info(&self) -> Option<&str> {
        present(&self.logistics)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Instance as reported by the AMQP inventory API (remote vocabulary)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteInstance {
    /// Provider-assigned identity
    pub instance_id: String,
    /// Tier, e.g. `PROFESSIONAL`
    pub instance_type: String,
    /// Lifecycle status, e.g. `SERVING`
    pub status: String,
    /// Public network access flag
    pub support_eip: bool,
    /// Renewal unit, e.g. `M`
    pub renewal_duration_unit: Option<String>,
    /// Peak messages per second
    pub max_tps: Option<String>,
    /// Peak public-network messages per second
    pub max_eip_tps: Option<String>,
    /// Maximum number of queues
    pub max_queue: Option<String>,
    /// Storage size
    pub storage_size: Option<String>,
}

/// Billing attributes from the available-instances query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BillingAttributes {
    /// Subscription type, e.g. `Subscription`
    pub subscription_type: String,
    /// Renewal length
    pub renewal_duration: Option<u32>,
    /// Renewal status, e.g. `AutoRenewal`
    pub renew_status: Option<String>,
}

/// Local view of an instance, rebuilt by every read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Provider-assigned identity
    pub instance_id: String,
    /// Tier in local spelling
    pub instance_type: String,
    /// Lifecycle status
    pub status: String,
    /// Public network access flag
    pub support_eip: bool,
    /// Billing model
    pub payment_type: String,
    /// Renewal length
    pub renewal_duration: Option<u32>,
    /// Renewal unit in local spelling
    pub renewal_duration_unit: Option<String>,
    /// Renewal status
    pub renewal_status: Option<String>,
    /// Peak messages per second
    pub max_tps: Option<String>,
    /// Peak public-network messages per second
    pub max_eip_tps: Option<String>,
    /// Maximum number of queues
    pub queue_capacity: Option<String>,
    /// Storage size
    pub storage_size: Option<String>,
}
