//! Request payload assembly
//!
//! Optional attributes become parameters only when they are set; an absent
//! attribute never turns into a zero value on the wire. Every payload
//! carries an idempotency token so a redelivered call is recognised by the
//! provider.

use crate::changes::{ChangeSet, Field};
use crate::config::ProductConfig;
use crate::error::{Error, Result};
use crate::model::InstanceConfig;
use crate::traits::{ApiRequest, Service};
use crate::translate::FieldTranslator;
use serde_json::{Value, json};

/// Action that provisions an instance
pub const ACTION_CREATE: &str = "CreateInstance";
/// Action that changes capacity attributes
pub const ACTION_MODIFY: &str = "ModifyInstance";
/// Action that changes renewal attributes
pub const ACTION_SET_RENEWAL: &str = "SetRenewal";

const CLIENT_TOKEN_MAX_LEN: usize = 64;

/// Build an idempotency token for `action`
///
/// Format: `TF-<action>-<unix seconds>-<uuid>`, cut to 64 characters.
pub fn client_token(action: &str) -> String {
    let mut token = format!(
        "TF-{}-{}-{}",
        action,
        chrono::Utc::now().timestamp(),
        uuid::Uuid::new_v4().simple()
    );
    token.truncate(CLIENT_TOKEN_MAX_LEN);
    token
}

/// Builds provisioning and modification requests from declared configuration
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    region: String,
    product: ProductConfig,
    translator: FieldTranslator,
}

impl RequestBuilder {
    /// Create a builder for a region
    pub fn new(region: impl Into<String>, product: ProductConfig, translator: FieldTranslator) -> Self {
        Self {
            region: region.into(),
            product,
            translator,
        }
    }

    fn billing_request(&self, action: &str) -> ApiRequest {
        ApiRequest::new(Service::Billing, action, &self.product.billing_api_version)
    }

    /// Full `CreateInstance` request
    pub fn create(&self, config: &InstanceConfig) -> Result<ApiRequest> {
        config.validate()?;

        let mut parameters = ParameterList::default();
        parameters.push("Region", self.region.as_str());
        parameters.push(
            "InstanceType",
            self.translator.tier_request(config.instance_type.as_str()),
        );
        parameters.push_opt("MaxEipTps", config.eip_throughput());
        parameters.push("MaxTps", config.max_tps.as_str());
        parameters.push("QueueCapacity", config.queue_capacity.as_str());
        parameters.push("SupportEip", self.translator.support_eip_request(config.support_eip));
        parameters.push_opt("StorageSize", config.storage());

        let mut request = self.billing_request(ACTION_CREATE);
        request.set("Parameter", parameters.into_value());
        request.set("SubscriptionType", config.payment_type.as_str());
        request.set("ProductCode", self.product.product_code.as_str());
        request.set("ProductType", self.product.product_type.as_str());
        if let Some(logistics) = config.logistics_info() {
            request.set("Logistics", logistics);
        }
        if let Some(period) = config.period {
            request.set("Period", period);
        }
        if let Some(duration) = config.renewal_duration {
            request.set("RenewPeriod", duration);
        }
        if let Some(status) = config.renewal_status {
            request.set("RenewalStatus", status.as_str());
        }
        request.set("ClientToken", client_token(ACTION_CREATE));

        Ok(request)
    }

    /// `SetRenewal` request, or `None` when no renewal attribute changed
    pub fn renewal(
        &self,
        instance_id: &str,
        config: &InstanceConfig,
        changes: &ChangeSet,
    ) -> Option<ApiRequest> {
        if !changes.has_any(Field::RENEWAL) {
            return None;
        }

        let mut request = self.billing_request(ACTION_SET_RENEWAL);
        request.set("InstanceIDs", instance_id);
        if let Some(status) = config.renewal_status {
            request.set("RenewalStatus", status.as_str());
        }
        if changes.has(Field::PaymentType) {
            request.set("SubscriptionType", config.payment_type.as_str());
        }
        request.set("ProductCode", self.product.product_code.as_str());
        request.set("ProductType", self.product.product_type.as_str());
        if changes.has(Field::RenewalDuration)
            && let Some(duration) = config.renewal_duration
        {
            request.set("RenewalPeriod", duration);
        }
        if changes.has(Field::RenewalDurationUnit)
            && let Some(unit) = config.renewal_duration_unit
        {
            request.set(
                "RenewalPeriodUnit",
                self.translator.renewal_unit_request(unit.as_str()),
            );
        }
        request.set("ClientToken", client_token(ACTION_SET_RENEWAL));

        Some(request)
    }

    /// `ModifyInstance` request, or `None` when no capacity attribute changed
    ///
    /// Fails with a configuration error when EIP support is enabled but no
    /// EIP throughput is declared, whether or not anything changed.
    pub fn modify(
        &self,
        instance_id: &str,
        config: &InstanceConfig,
        changes: &ChangeSet,
    ) -> Result<Option<ApiRequest>> {
        let mut parameters = ParameterList::default();
        match config.eip_throughput() {
            Some(eip_tps) => parameters.push("MaxEipTps", eip_tps),
            None if config.support_eip => {
                return Err(Error::config(
                    "max_eip_tps is required when support_eip is true",
                ));
            }
            None => {}
        }
        parameters.push("MaxTps", config.max_tps.as_str());
        parameters.push("QueueCapacity", config.queue_capacity.as_str());
        parameters.push("SupportEip", self.translator.support_eip_request(config.support_eip));

        let update = changes.has_any(&[
            Field::MaxEipTps,
            Field::MaxTps,
            Field::QueueCapacity,
            Field::SupportEip,
        ]) || changes.is_new_resource();
        if !update {
            return Ok(None);
        }

        let mut request = self.billing_request(ACTION_MODIFY);
        request.set("InstanceId", instance_id);
        request.set("Parameter", parameters.into_value());
        request.set("SubscriptionType", config.payment_type.as_str());
        request.set("ProductCode", self.product.product_code.as_str());
        request.set("ProductType", self.product.product_type.as_str());
        if let Some(modify_type) = config.modify_type {
            request.set("ModifyType", modify_type.as_str());
        }
        request.set("ClientToken", client_token(ACTION_MODIFY));

        Ok(Some(request))
    }
}

/// Ordered `{Code, Value}` parameter list
#[derive(Debug, Default)]
struct ParameterList(Vec<Value>);

impl ParameterList {
    fn push(&mut self, code: &str, value: impl Into<String>) {
        self.0.push(json!({ "Code": code, "Value": value.into() }));
    }

    fn push_opt(&mut self, code: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.push(code, value);
        }
    }

    fn into_value(self) -> Value {
        Value::Array(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InstanceTier, ModifyType, RenewalDurationUnit, RenewalStatus};

    fn builder() -> RequestBuilder {
        RequestBuilder::new("cn-hangzhou", ProductConfig::default(), FieldTranslator::default())
    }

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(c, v)| (c.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn create_emits_parameters_in_order() {
        let config =
            InstanceConfig::new(InstanceTier::Vip, "1000", "100", true).with_max_eip_tps("50");

        let request = builder().create(&config).unwrap();

        assert_eq!(request.action, ACTION_CREATE);
        assert_eq!(request.version, "2017-12-14");
        assert_eq!(
            request.parameter_list(),
            pairs(&[
                ("Region", "cn-hangzhou"),
                ("InstanceType", "vip"),
                ("MaxEipTps", "50"),
                ("MaxTps", "1000"),
                ("QueueCapacity", "100"),
                ("SupportEip", "eip_true"),
            ])
        );
        assert_eq!(request.get("SubscriptionType"), Some(&json!("Subscription")));
        assert_eq!(request.get("ProductCode"), Some(&json!("ons")));
        assert_eq!(request.get("ProductType"), Some(&json!("ons_onsproxy_pre")));
        assert!(request.get("Period").is_none());
        assert!(request.get("RenewPeriod").is_none());
        assert!(request.get("Logistics").is_none());
    }

    #[test]
    fn create_includes_optional_billing_fields_when_set() {
        let config = InstanceConfig::new(InstanceTier::Professional, "1000", "50", false)
            .with_storage_size("700")
            .with_period(12)
            .with_renewal(RenewalStatus::AutoRenewal, Some(1), Some(RenewalDurationUnit::Month));

        let request = builder().create(&config).unwrap();

        let list = request.parameter_list();
        assert_eq!(list.last(), Some(&("StorageSize".to_string(), "700".to_string())));
        assert!(!list.iter().any(|(code, _)| code == "MaxEipTps"));
        assert_eq!(request.get("Period"), Some(&json!(12)));
        assert_eq!(request.get("RenewPeriod"), Some(&json!(1)));
        assert_eq!(request.get("RenewalStatus"), Some(&json!("AutoRenewal")));
    }

    #[test]
    fn create_rejects_invalid_config() {
        let config = InstanceConfig::new(InstanceTier::Vip, "1000", "100", false).with_period(7);
        assert!(matches!(builder().create(&config), Err(Error::Config(_))));
    }

    #[test]
    fn client_token_names_action_and_fits_limit() {
        let token = client_token(ACTION_CREATE);
        assert!(token.starts_with("TF-CreateInstance-"));
        assert!(token.len() <= CLIENT_TOKEN_MAX_LEN);
        assert_ne!(token, client_token(ACTION_CREATE));
    }

    #[test]
    fn renewal_only_includes_changed_fields() {
        let config = InstanceConfig::new(InstanceTier::Vip, "1000", "100", false).with_renewal(
            RenewalStatus::AutoRenewal,
            Some(6),
            Some(RenewalDurationUnit::Year),
        );
        let changes = ChangeSet::new().with(Field::RenewalDurationUnit);

        let request = builder().renewal("amqp-1", &config, &changes).unwrap();

        assert_eq!(request.action, ACTION_SET_RENEWAL);
        assert_eq!(request.get("InstanceIDs"), Some(&json!("amqp-1")));
        assert_eq!(request.get("RenewalStatus"), Some(&json!("AutoRenewal")));
        assert_eq!(request.get("RenewalPeriodUnit"), Some(&json!("Y")));
        assert!(request.get("RenewalPeriod").is_none());
        assert!(request.get("SubscriptionType").is_none());
        assert!(request.get("ClientToken").is_some());
    }

    #[test]
    fn renewal_is_skipped_without_renewal_changes() {
        let config = InstanceConfig::new(InstanceTier::Vip, "1000", "100", false);
        let changes = ChangeSet::new().with(Field::MaxTps);
        assert!(builder().renewal("amqp-1", &config, &changes).is_none());
    }

    #[test]
    fn modify_requires_eip_throughput_when_eip_enabled() {
        let config = InstanceConfig::new(InstanceTier::Vip, "1000", "100", true);
        let changes = ChangeSet::new();

        let result = builder().modify("amqp-1", &config, &changes);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn modify_carries_hint_and_parameters() {
        let config = InstanceConfig::new(InstanceTier::Vip, "2000", "100", true)
            .with_max_eip_tps("64")
            .with_modify_type(ModifyType::Upgrade);
        let changes = ChangeSet::new().with(Field::MaxTps);

        let request = builder().modify("amqp-1", &config, &changes).unwrap().unwrap();

        assert_eq!(request.action, ACTION_MODIFY);
        assert_eq!(request.get("InstanceId"), Some(&json!("amqp-1")));
        assert_eq!(request.get("ModifyType"), Some(&json!("Upgrade")));
        assert_eq!(
            request.parameter_list(),
            pairs(&[
                ("MaxEipTps", "64"),
                ("MaxTps", "2000"),
                ("QueueCapacity", "100"),
                ("SupportEip", "eip_true"),
            ])
        );
    }

    #[test]
    fn modify_is_skipped_without_capacity_changes_unless_new() {
        let config = InstanceConfig::new(InstanceTier::Vip, "1000", "100", false);

        let changes = ChangeSet::new().with(Field::RenewalStatus);
        assert!(builder().modify("amqp-1", &config, &changes).unwrap().is_none());

        let changes = ChangeSet::new_resource();
        assert!(builder().modify("amqp-1", &config, &changes).unwrap().is_some());
    }
}
