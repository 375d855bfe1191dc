//! Readiness poller
//!
//! Waits for an asynchronously provisioned instance to reach a ready
//! status. Each poll reads the status once:
//!
//! - status in the ready set: stop, success
//! - status in the failed set: stop, [`Error::ReadinessFailed`]
//! - anything else, or not visible yet: sleep one interval and poll again
//!
//! Polling stops with [`Error::Timeout`] once the deadline has passed.

use crate::config::PollConfig;
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Outcome of a successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    /// Status that ended the wait
    pub status: String,
    /// Number of status reads performed
    pub polls: u32,
}

/// Polls a status source until a target state, a failure state or a deadline
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    interval: Duration,
    ready_states: Vec<String>,
    failed_states: Vec<String>,
}

impl ReadinessPoller {
    /// Create a poller
    pub fn new(interval: Duration, ready_states: Vec<String>, failed_states: Vec<String>) -> Self {
        Self {
            interval,
            ready_states,
            failed_states,
        }
    }

    /// Create a poller from configuration
    pub fn from_config(config: &PollConfig) -> Self {
        Self::new(
            config.interval(),
            config.ready_states.clone(),
            config.failed_states.clone(),
        )
    }

    /// Poll `refresh` until `instance_id` is ready
    ///
    /// `refresh` returns the current status, or `None` while the instance is
    /// not visible yet. Errors from `refresh` end the wait.
    pub async fn wait_for<F, Fut>(
        &self,
        instance_id: &str,
        deadline: Instant,
        mut refresh: F,
    ) -> Result<Readiness>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<String>>>,
    {
        let started = Instant::now();
        let mut polls: u32 = 0;
        let mut last_status: Option<String> = None;

        loop {
            polls += 1;
            match refresh().await? {
                Some(status) if self.ready_states.contains(&status) => {
                    info!(instance_id, %status, polls, "Instance is ready");
                    return Ok(Readiness { status, polls });
                }
                Some(status) if self.failed_states.contains(&status) => {
                    return Err(Error::readiness_failed(instance_id, status));
                }
                Some(status) => {
                    debug!(instance_id, %status, polls, "Instance still pending");
                    last_status = Some(status);
                }
                None => {
                    debug!(instance_id, polls, "Instance not visible yet");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    action: format!("waiting for {instance_id} to become ready"),
                    elapsed_secs: now.duration_since(started).as_secs(),
                    last_error: format!(
                        "last observed status: {}",
                        last_status.as_deref().unwrap_or("<none>")
                    ),
                });
            }
            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }
    }
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::from_config(&PollConfig::default())
    }
}
