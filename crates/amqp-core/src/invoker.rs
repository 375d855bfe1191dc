//! Retrying invoker
//!
//! Executes one logical remote call against an [`ApiTransport`], retrying
//! transient failures with an incremental backoff until a deadline, and
//! switching to the alternate endpoint once when the provider reports a
//! region mismatch.
//!
//! ```text
//!   call ──ok──────────────────────────────────────────▶ response
//!     │
//!     └─err─▶ classify ─Retryable──▶ deadline? ─no──▶ sleep(backoff) ─▶ call
//!                 │                      └─yes─▶ Timeout
//!                 ├─RegionMismatch─▶ swapped? ─no──▶ use alternate ─▶ call
//!                 │                      └─yes─▶ RegionMismatch
//!                 ├─NotFound──────▶ NotFound
//!                 └─Fatal─────────▶ Api
//! ```
//!
//! The endpoint swap is sticky for the rest of the invocation and happens at
//! most once. The deadline is only checked between attempts; a call in
//! flight runs to completion or to the transport's own timeout.

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::traits::{ApiRequest, ApiTransport, ErrorClass, classify, value_text};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const SUCCESS_CODE: &str = "Success";

/// Endpoint to call first and the one to fall back to on region mismatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Endpoint tried first
    pub primary: String,
    /// Endpoint used after a region mismatch, if the API has one
    pub alternate: Option<String>,
}

impl Endpoints {
    /// Endpoints with a fallback
    pub fn with_alternate(primary: impl Into<String>, alternate: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            alternate: Some(alternate.into()),
        }
    }

    /// A single endpoint without fallback
    pub fn single(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            alternate: None,
        }
    }
}

/// Incremental backoff: `base`, `base + increment`, `base + 2 * increment`, ...
#[derive(Debug, Clone)]
pub struct IncrementalBackoff {
    next: Duration,
    increment: Duration,
}

impl IncrementalBackoff {
    /// Start a backoff sequence
    pub fn new(base: Duration, increment: Duration) -> Self {
        Self {
            next: base,
            increment,
        }
    }

    /// Wait before the next retry
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_add(self.increment);
        delay
    }
}

/// Invoker of remote calls with retry, endpoint fallback and deadline
///
/// Holds no per-call state; each [`invoke`](Self::invoke) keeps its own
/// backoff and endpoint override, so one invoker can serve concurrent
/// reconciliations.
#[derive(Clone)]
pub struct RetryingInvoker {
    transport: Arc<dyn ApiTransport>,
    retry: RetryConfig,
}

impl std::fmt::Debug for RetryingInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingInvoker")
            .field("transport", &self.transport.transport_name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl RetryingInvoker {
    /// Create an invoker over a transport
    pub fn new(transport: Arc<dyn ApiTransport>, retry: RetryConfig) -> Self {
        Self { transport, retry }
    }

    /// Execute `request`, retrying until `deadline`
    ///
    /// Returns the parsed response body of the first successful attempt.
    /// The response `Code` is not inspected here; see [`ensure_success`].
    pub async fn invoke(
        &self,
        endpoints: &Endpoints,
        request: &ApiRequest,
        deadline: Instant,
    ) -> Result<Value> {
        let started = Instant::now();
        let mut backoff = IncrementalBackoff::new(self.retry.base_delay(), self.retry.increment());
        let mut endpoint = endpoints.primary.as_str();
        let mut swapped = false;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(
                action = %request.action,
                service = request.service.as_str(),
                endpoint,
                attempt,
                "Invoking remote action"
            );

            let err = match self.transport.call(endpoint, request).await {
                Ok(response) => {
                    debug!(
                        action = %request.action,
                        request = %request.echo(),
                        response = %response,
                        "Remote action returned"
                    );
                    return Ok(response);
                }
                Err(err) => err,
            };

            match classify(&err) {
                ErrorClass::Retryable => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(action = %request.action, attempt, "Retry deadline reached: {}", err);
                        return Err(Error::Timeout {
                            action: request.action.clone(),
                            elapsed_secs: now.duration_since(started).as_secs(),
                            last_error: err.to_string(),
                        });
                    }
                    let wait = backoff.next_delay().min(deadline - now);
                    warn!(
                        action = %request.action,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Retryable failure: {}",
                        err
                    );
                    tokio::time::sleep(wait).await;
                }
                ErrorClass::RegionMismatch => match endpoints.alternate.as_deref() {
                    Some(alternate) if !swapped => {
                        info!(
                            action = %request.action,
                            from = endpoint,
                            to = alternate,
                            "Region mismatch, switching endpoint"
                        );
                        swapped = true;
                        endpoint = alternate;
                        if Instant::now() >= deadline {
                            return Err(Error::Timeout {
                                action: request.action.clone(),
                                elapsed_secs: started.elapsed().as_secs(),
                                last_error: err.to_string(),
                            });
                        }
                    }
                    _ => {
                        return Err(Error::RegionMismatch {
                            action: request.action.clone(),
                            message: err.message().to_string(),
                            request: request.echo(),
                        });
                    }
                },
                ErrorClass::NotFound => {
                    return Err(Error::not_found(format!("{}: {}", request.action, err)));
                }
                ErrorClass::Fatal => {
                    return Err(Error::Api {
                        action: request.action.clone(),
                        code: err.code().unwrap_or("Unknown").to_string(),
                        message: err.message().to_string(),
                        request: request.echo(),
                    });
                }
            }
        }
    }

    /// Execute `request` with a budget measured from now
    pub async fn invoke_within(
        &self,
        endpoints: &Endpoints,
        request: &ApiRequest,
        budget: Duration,
    ) -> Result<Value> {
        self.invoke(endpoints, request, Instant::now() + budget).await
    }
}

/// Check the response-level status code
///
/// A transport-level success whose `Code` is not `Success` is still a
/// failed call.
pub fn ensure_success(request: &ApiRequest, response: &Value) -> Result<()> {
    let code = value_text(&response["Code"]);
    if code == SUCCESS_CODE {
        return Ok(());
    }
    Err(Error::Application {
        action: request.action.clone(),
        code: if code.is_empty() { "<missing>".to_string() } else { code },
        request: request.echo(),
        response: response.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Service;
    use serde_json::json;

    #[test]
    fn backoff_grows_by_increment() {
        let mut backoff = IncrementalBackoff::new(Duration::from_secs(3), Duration::from_secs(3));
        let delays: Vec<_> = (0..4).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![3, 6, 9, 12]);
    }

    #[test]
    fn ensure_success_accepts_success_code() {
        let request = ApiRequest::new(Service::Billing, "SetRenewal", "2017-12-14");
        assert!(ensure_success(&request, &json!({"Code": "Success"})).is_ok());
    }

    #[test]
    fn ensure_success_rejects_other_codes() {
        let request = ApiRequest::new(Service::Billing, "SetRenewal", "2017-12-14")
            .param("InstanceIDs", "amqp-1");

        let err = ensure_success(&request, &json!({"Code": "OrderFailed", "Message": "no"}))
            .unwrap_err();
        match err {
            Error::Application {
                action,
                code,
                request,
                response,
            } => {
                assert_eq!(action, "SetRenewal");
                assert_eq!(code, "OrderFailed");
                assert!(request.contains("amqp-1"));
                assert!(response.contains("OrderFailed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = ensure_success(&request, &json!({})).unwrap_err();
        assert!(matches!(err, Error::Application { ref code, .. } if code == "<missing>"));
    }
}
