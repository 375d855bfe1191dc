//! Remote inventory and billing queries
//!
//! Read-only lookups used by the reconciler's read path and by the
//! readiness poller. Results stay in remote vocabulary; translation happens
//! in the reconciler.

use crate::config::ProductConfig;
use crate::error::{Error, Result};
use crate::invoker::{Endpoints, RetryingInvoker, ensure_success};
use crate::model::{BillingAttributes, RemoteInstance};
use crate::traits::{ApiRequest, Service, value_text};
use serde_json::Value;
use std::collections::HashSet;
use tokio::time::Instant;
use tracing::debug;

/// Action listing AMQP instances
pub const ACTION_LIST_INSTANCES: &str = "ListInstances";
/// Action querying billing state of instances
pub const ACTION_QUERY_AVAILABLE_INSTANCES: &str = "QueryAvailableInstances";

const LIST_PAGE_SIZE: u32 = 100;

/// Read-only queries against the inventory and billing APIs
#[derive(Debug, Clone)]
pub struct InstanceQueries {
    invoker: RetryingInvoker,
    billing: Endpoints,
    amqp: Endpoints,
    product: ProductConfig,
}

impl InstanceQueries {
    /// Create the query service
    pub fn new(
        invoker: RetryingInvoker,
        billing: Endpoints,
        amqp: Endpoints,
        product: ProductConfig,
    ) -> Self {
        Self {
            invoker,
            billing,
            amqp,
            product,
        }
    }

    /// Find an instance by id
    ///
    /// Pages through the inventory; returns [`Error::NotFound`] when no page
    /// contains `instance_id`. A token that was already followed is an
    /// [`Error::InvalidResponse`]; paging fails with [`Error::Timeout`] once
    /// `deadline` has passed.
    pub async fn describe_instance(
        &self,
        instance_id: &str,
        deadline: Instant,
    ) -> Result<RemoteInstance> {
        let started = Instant::now();
        let mut next_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let mut request = ApiRequest::new(
                Service::Amqp,
                ACTION_LIST_INSTANCES,
                &self.product.amqp_api_version,
            )
            .param("MaxResults", LIST_PAGE_SIZE);
            if let Some(token) = &next_token {
                request.set("NextToken", token.as_str());
            }

            let response = self.invoker.invoke(&self.amqp, &request, deadline).await?;
            let data = &response["Data"];
            let instances = data["Instances"].as_array().ok_or_else(|| {
                Error::invalid_response(format!(
                    "{ACTION_LIST_INSTANCES}: Data.Instances is not an array: {response}"
                ))
            })?;

            if let Some(item) = instances
                .iter()
                .find(|item| value_text(&item["InstanceId"]) == instance_id)
            {
                return Ok(parse_instance(item));
            }

            let token = value_text(&data["NextToken"]);
            if token.is_empty() {
                break;
            }
            if !seen_tokens.insert(token.clone()) {
                return Err(Error::invalid_response(format!(
                    "{ACTION_LIST_INSTANCES}: NextToken {token} was already followed"
                )));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    action: format!("{ACTION_LIST_INSTANCES} paging for {instance_id}"),
                    elapsed_secs: now.duration_since(started).as_secs(),
                    last_error: format!("{} pages read, next token {token}", seen_tokens.len()),
                });
            }
            debug!(instance_id, "Instance not on this page, following NextToken");
            next_token = Some(token);
        }

        Err(Error::not_found(format!("AMQP instance {instance_id}")))
    }

    /// Status of an instance, or `None` when it is not visible
    pub async fn instance_status(
        &self,
        instance_id: &str,
        deadline: Instant,
    ) -> Result<Option<String>> {
        match self.describe_instance(instance_id, deadline).await {
            Ok(instance) => Ok(Some(instance.status)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Billing attributes of an instance
    pub async fn query_available_instances(
        &self,
        instance_id: &str,
        deadline: Instant,
    ) -> Result<BillingAttributes> {
        let request = ApiRequest::new(
            Service::Billing,
            ACTION_QUERY_AVAILABLE_INSTANCES,
            &self.product.billing_api_version,
        )
        .param("InstanceIDs", instance_id)
        .param("ProductCode", self.product.product_code.as_str())
        .param("ProductType", self.product.product_type.as_str());

        let response = self.invoker.invoke(&self.billing, &request, deadline).await?;
        ensure_success(&request, &response)?;

        let entry = response["Data"]["InstanceList"]
            .as_array()
            .and_then(|list| list.first())
            .ok_or_else(|| Error::not_found(format!("billing record of {instance_id}")))?;

        Ok(BillingAttributes {
            subscription_type: value_text(&entry["SubscriptionType"]),
            renewal_duration: parse_u32(&entry["RenewalDuration"]),
            renew_status: opt_text(&entry["RenewStatus"]),
        })
    }
}

fn parse_instance(item: &Value) -> RemoteInstance {
    RemoteInstance {
        instance_id: value_text(&item["InstanceId"]),
        instance_type: value_text(&item["InstanceType"]),
        status: value_text(&item["Status"]),
        support_eip: parse_bool(&item["SupportEIP"]),
        renewal_duration_unit: opt_text(&item["RenewalDurationUnit"]),
        max_tps: opt_text(&item["MaxTps"]),
        max_eip_tps: opt_text(&item["MaxEipTps"]),
        max_queue: opt_text(&item["MaxQueue"]),
        storage_size: opt_text(&item["StorageSize"]),
    }
}

fn opt_text(value: &Value) -> Option<String> {
    Some(value_text(value)).filter(|text| !text.is_empty())
}

fn parse_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn parse_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
