//! Test doubles and common utilities for reconciliation contract tests
//!
//! The scripted transport answers each action from a queue of canned
//! results and records every call it receives, so tests can assert on the
//! exact sequence of endpoints and payloads.

#![allow(dead_code)]

use amqp_core::config::ReconcilerConfig;
use amqp_core::traits::{ApiRequest, ApiTransport, CallError};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const PRIMARY: &str = "business.aliyuncs.com";
pub const ALTERNATE: &str = "business.ap-southeast-1.aliyuncs.com";
pub const AMQP_ENDPOINT: &str = "amqp-open.cn-hangzhou.aliyuncs.com";

/// A call seen by the scripted transport
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: String,
    pub request: ApiRequest,
}

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Result<Value, CallError>>>,
    always: HashMap<String, Result<Value, CallError>>,
}

/// Transport that answers from per-action scripts
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot result for `action`
    pub fn respond(&self, action: &str, result: Result<Value, CallError>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(action.to_string())
            .or_default()
            .push_back(result);
        self
    }

    /// Result for `action` once its queue is drained
    pub fn respond_always(&self, action: &str, result: Result<Value, CallError>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .always
            .insert(action.to_string(), result);
        self
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls received for `action`
    pub fn calls_for(&self, action: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.request.action == action)
            .collect()
    }

    /// Endpoints hit, in order
    pub fn endpoints(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.endpoint).collect()
    }

    pub fn as_transport(&self) -> Arc<dyn ApiTransport> {
        Arc::new(self.clone())
    }
}

#[async_trait::async_trait]
impl ApiTransport for ScriptedTransport {
    async fn call(&self, endpoint: &str, request: &ApiRequest) -> Result<Value, CallError> {
        self.calls.lock().unwrap().push(RecordedCall {
            endpoint: endpoint.to_string(),
            request: request.clone(),
        });

        let mut script = self.script.lock().unwrap();
        if let Some(result) = script
            .queued
            .get_mut(&request.action)
            .and_then(VecDeque::pop_front)
        {
            return result;
        }
        script
            .always
            .get(&request.action)
            .cloned()
            .unwrap_or_else(|| {
                Err(CallError::api(
                    "NoScript",
                    format!("no scripted response for {}", request.action),
                ))
            })
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

pub fn throttled() -> Result<Value, CallError> {
    Err(CallError::api("Throttling.User", "Request was denied due to user flow control."))
}

pub fn not_applicable() -> Result<Value, CallError> {
    Err(CallError::api("NotApplicable", "This API is not applicable for caller."))
}

pub fn success() -> Result<Value, CallError> {
    Ok(json!({"Code": "Success", "Success": true}))
}

pub fn created(instance_id: &str) -> Result<Value, CallError> {
    Ok(json!({
        "Code": "Success",
        "Data": {"InstanceId": instance_id, "OrderId": "2041"},
    }))
}

/// `ListInstances` page containing one instance
pub fn listed(instance_id: &str, instance_type: &str, status: &str, support_eip: bool) -> Result<Value, CallError> {
    Ok(json!({
        "RequestId": "req-1",
        "Data": {
            "Instances": [{
                "InstanceId": instance_id,
                "InstanceType": instance_type,
                "Status": status,
                "SupportEIP": support_eip,
                "MaxTps": 1000,
                "MaxEipTps": 50,
                "MaxQueue": 100,
                "RenewalDurationUnit": "M",
            }],
            "NextToken": "",
            "MaxResults": 100,
        },
    }))
}

/// Empty `ListInstances` page
pub fn listed_none() -> Result<Value, CallError> {
    Ok(json!({"Data": {"Instances": [], "NextToken": ""}}))
}

/// `QueryAvailableInstances` answer
pub fn billing(renew_status: &str, renewal_duration: u32) -> Result<Value, CallError> {
    Ok(json!({
        "Code": "Success",
        "Data": {
            "InstanceList": [{
                "SubscriptionType": "Subscription",
                "RenewalDuration": renewal_duration,
                "RenewStatus": renew_status,
            }],
        },
    }))
}

/// Reconciler configuration used across tests
pub fn test_config() -> ReconcilerConfig {
    ReconcilerConfig::new("cn-hangzhou")
}
