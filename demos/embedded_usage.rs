//! Minimal embedding example for amqp-core
//!
//! Drives the reconciler through create, read, update and delete against an
//! in-memory stand-in for the billing and inventory APIs. The simulated
//! account is international, so billing calls on the domestic endpoint are
//! rejected and the reconciler switches endpoints on its own.

use amqp_core::model::{RenewalDurationUnit, RenewalStatus};
use amqp_core::traits::{ApiRequest, ApiTransport, CallError};
use amqp_core::{InstanceConfig, InstanceReconciler, InstanceTier, ReconcilerConfig, Result};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Instance record kept by the simulated provider
#[derive(Debug, Clone)]
struct SimulatedInstance {
    instance_type: String,
    max_tps: String,
    max_queue: String,
    support_eip: bool,
    renew_status: String,
    renewal_duration: u32,
    polls_until_serving: u32,
}

/// In-memory provider answering the RPC actions the reconciler uses
#[derive(Default)]
struct SimulatedApi {
    instances: Mutex<HashMap<String, SimulatedInstance>>,
    next_id: Mutex<u32>,
}

impl SimulatedApi {
    fn parameter(request: &ApiRequest, code: &str) -> Option<String> {
        request
            .parameter_list()
            .into_iter()
            .find(|(c, _)| c == code)
            .map(|(_, v)| v)
    }

    fn text(request: &ApiRequest, key: &str) -> String {
        request
            .get(key)
            .map(amqp_core::traits::value_text)
            .unwrap_or_default()
    }

    fn create(&self, request: &ApiRequest) -> Value {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let instance_id = format!("amqp-cn-sim{:04}", *next_id);

        let instance = SimulatedInstance {
            instance_type: Self::parameter(request, "InstanceType")
                .unwrap_or_default()
                .to_uppercase(),
            max_tps: Self::parameter(request, "MaxTps").unwrap_or_default(),
            max_queue: Self::parameter(request, "QueueCapacity").unwrap_or_default(),
            support_eip: Self::parameter(request, "SupportEip").as_deref() == Some("eip_true"),
            renew_status: Self::text(request, "RenewalStatus"),
            renewal_duration: 1,
            polls_until_serving: 2,
        };
        self.instances
            .lock()
            .unwrap()
            .insert(instance_id.clone(), instance);

        json!({"Code": "Success", "Data": {"InstanceId": instance_id}})
    }

    fn list(&self) -> Value {
        let mut instances = self.instances.lock().unwrap();
        let items: Vec<Value> = instances
            .iter_mut()
            .map(|(id, instance)| {
                let status = if instance.polls_until_serving > 0 {
                    instance.polls_until_serving -= 1;
                    "DEPLOYING"
                } else {
                    "SERVING"
                };
                json!({
                    "InstanceId": id,
                    "InstanceType": instance.instance_type,
                    "Status": status,
                    "SupportEIP": instance.support_eip,
                    "MaxTps": instance.max_tps,
                    "MaxQueue": instance.max_queue,
                    "RenewalDurationUnit": "M",
                })
            })
            .collect();
        json!({"Data": {"Instances": items, "NextToken": ""}})
    }

    fn billing(&self, request: &ApiRequest) -> Value {
        let instances = self.instances.lock().unwrap();
        let list: Vec<Value> = instances
            .get(&Self::text(request, "InstanceIDs"))
            .map(|instance| {
                json!({
                    "SubscriptionType": "Subscription",
                    "RenewStatus": instance.renew_status,
                    "RenewalDuration": instance.renewal_duration,
                })
            })
            .into_iter()
            .collect();
        json!({"Code": "Success", "Data": {"InstanceList": list}})
    }

    fn set_renewal(&self, request: &ApiRequest) -> Value {
        let mut instances = self.instances.lock().unwrap();
        if let Some(instance) = instances.get_mut(&Self::text(request, "InstanceIDs")) {
            instance.renew_status = Self::text(request, "RenewalStatus");
            if let Some(period) = request.get("RenewalPeriod").and_then(Value::as_u64) {
                instance.renewal_duration = period as u32;
            }
        }
        json!({"Code": "Success"})
    }

    fn modify(&self, request: &ApiRequest) -> Value {
        let mut instances = self.instances.lock().unwrap();
        if let Some(instance) = instances.get_mut(&Self::text(request, "InstanceId")) {
            if let Some(tps) = Self::parameter(request, "MaxTps") {
                instance.max_tps = tps;
            }
            if let Some(queues) = Self::parameter(request, "QueueCapacity") {
                instance.max_queue = queues;
            }
        }
        json!({"Code": "Success"})
    }
}

#[async_trait::async_trait]
impl ApiTransport for SimulatedApi {
    async fn call(&self, endpoint: &str, request: &ApiRequest) -> std::result::Result<Value, CallError> {
        println!("[Simulated] {} -> {}", request.action, endpoint);

        if endpoint == "business.aliyuncs.com" {
            return Err(CallError::api(
                "NotApplicable",
                "This API is not applicable for caller.",
            ));
        }

        match request.action.as_str() {
            "CreateInstance" => Ok(self.create(request)),
            "ListInstances" => Ok(self.list()),
            "QueryAvailableInstances" => Ok(self.billing(request)),
            "SetRenewal" => Ok(self.set_renewal(request)),
            "ModifyInstance" => Ok(self.modify(request)),
            other => Err(CallError::api("InvalidAction.NotFound", other)),
        }
    }

    fn transport_name(&self) -> &'static str {
        "simulated"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Embedded amqp-core Example ===\n");

    let mut config = ReconcilerConfig::new("cn-hangzhou");
    config.poll.interval_ms = 200;
    config.retry.base_delay_ms = 100;
    config.retry.increment_ms = 100;

    println!("1. Creating reconciler...");
    let (reconciler, mut event_rx) =
        InstanceReconciler::new(Arc::new(SimulatedApi::default()), config)?.with_events(32);

    let event_listener = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("[Event] {:?}", event);
        }
    });

    let declared = InstanceConfig::new(InstanceTier::Vip, "5000", "50", true)
        .with_max_eip_tps("128")
        .with_renewal(
            RenewalStatus::AutoRenewal,
            Some(1),
            Some(RenewalDurationUnit::Month),
        );

    println!("2. Creating instance...");
    let state = reconciler.create(&declared).await?;
    println!("   Created: {}", serde_json::to_string_pretty(&state)?);

    println!("3. Reading instance...");
    let outcome = reconciler.read(&state.instance_id).await?;
    println!("   Read: {:?}", outcome);

    println!("4. Updating capacity and renewal...");
    let planned = InstanceConfig {
        max_tps: "8000".to_string(),
        ..declared.clone()
    }
    .with_renewal(
        RenewalStatus::AutoRenewal,
        Some(6),
        Some(RenewalDurationUnit::Month),
    );
    let report = reconciler
        .update(&state.instance_id, &declared, &planned)
        .await?;
    for (field, result) in &report.fields {
        println!("   {field}: {result:?}");
    }

    println!("5. Deleting instance (remote instance stays provisioned)...");
    reconciler.delete(&state.instance_id).await?;

    drop(reconciler);
    let _ = event_listener.await;

    println!("\n=== Embedding Successful ===");
    Ok(())
}
