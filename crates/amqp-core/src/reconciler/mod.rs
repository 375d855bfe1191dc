//! Instance reconciler
//!
//! The InstanceReconciler is responsible for:
//! - Provisioning an instance from declared configuration and waiting for it
//! - Rebuilding local state from the provider's inventory and billing data
//! - Applying declared changes through renewal and capacity requests
//! - Releasing local identity on delete (the remote instance is kept)
//!
//! ## Architecture
//!
//! ```text
//!   InstanceConfig
//!         │
//!         ▼
//! ┌────────────────┐     ┌─────────────────┐     ┌──────────────┐
//! │ RequestBuilder │────▶│ RetryingInvoker │────▶│ ApiTransport │
//! └────────────────┘     └─────────────────┘     └──────────────┘
//!                                 ▲
//!         ┌───────────────────────┤
//!         │                       │
//! ┌────────────────┐     ┌─────────────────┐
//! │ReadinessPoller │────▶│ InstanceQueries │
//! └────────────────┘     └─────────────────┘
//!                                 │
//!                                 ▼
//!                      FieldTranslator ──▶ InstanceState
//! ```
//!
//! ## Operation Flow
//!
//! 1. Create: build request, invoke, take `InstanceId`, poll until ready, read
//! 2. Read: describe instance (absent means gone), query billing, translate
//! 3. Update: validate, build at most two requests, apply each independently, read
//! 4. Delete: log that the instance persists, succeed

use crate::changes::{ChangeSet, Field};
use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::invoker::{Endpoints, RetryingInvoker, ensure_success};
use crate::model::{InstanceConfig, InstanceState};
use crate::poller::ReadinessPoller;
use crate::request::RequestBuilder;
use crate::service::InstanceQueries;
use crate::traits::{ApiRequest, ApiTransport, value_text};
use crate::translate::FieldTranslator;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Events emitted by the InstanceReconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Create call accepted, identity assigned
    Created { instance_id: String },

    /// Instance reached a ready status
    Ready { instance_id: String, polls: u32 },

    /// An update request was applied
    UpdateApplied { instance_id: String, action: String },

    /// An update request failed
    UpdateFailed {
        instance_id: String,
        action: String,
        error: String,
    },

    /// Read found no remote instance
    Gone { instance_id: String },

    /// Local identity released, remote instance left in place
    Released { instance_id: String },
}

/// Result of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The instance exists; local state rebuilt from remote
    Found(InstanceState),
    /// The instance does not exist; the caller should clear its identity
    Gone,
}

impl ReadOutcome {
    /// The state, if the instance exists
    pub fn into_state(self) -> Option<InstanceState> {
        match self {
            ReadOutcome::Found(state) => Some(state),
            ReadOutcome::Gone => None,
        }
    }
}

/// Outcome for one declared attribute in an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldResult {
    /// The request carrying this attribute succeeded
    Applied,
    /// The request carrying this attribute failed
    Failed(String),
    /// No request carried this attribute
    Skipped,
}

impl FieldResult {
    fn rank(&self) -> u8 {
        match self {
            FieldResult::Skipped => 0,
            FieldResult::Applied => 1,
            FieldResult::Failed(_) => 2,
        }
    }
}

/// Per-attribute outcome of an update plus the state read afterwards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Outcome per updatable attribute
    pub fields: BTreeMap<Field, FieldResult>,
    /// State read after the update; `None` if the instance is gone or the
    /// read failed
    pub state: Option<InstanceState>,
    /// Failure of the read after the update, if any
    pub refresh_error: Option<String>,
    /// Attributes that differed between prior and planned configuration
    pub changed: BTreeSet<Field>,
}

impl UpdateReport {
    fn record(&mut self, fields: &[Field], result: &FieldResult) {
        for field in fields {
            let entry = self.fields.entry(*field).or_insert(FieldResult::Skipped);
            if result.rank() > entry.rank() {
                *entry = result.clone();
            }
        }
    }

    /// Outcome for `field`
    pub fn result(&self, field: Field) -> Option<&FieldResult> {
        self.fields.get(&field)
    }

    /// Attributes whose request failed
    pub fn failed_fields(&self) -> Vec<Field> {
        self.fields
            .iter()
            .filter(|(_, r)| matches!(r, FieldResult::Failed(_)))
            .map(|(f, _)| *f)
            .collect()
    }

    /// Attributes whose request succeeded
    pub fn applied_fields(&self) -> Vec<Field> {
        self.fields
            .iter()
            .filter(|(_, r)| **r == FieldResult::Applied)
            .map(|(f, _)| *f)
            .collect()
    }

    /// Changed attributes that no request carried
    pub fn unapplied_fields(&self) -> Vec<Field> {
        self.changed
            .iter()
            .filter(|f| matches!(self.fields.get(f), None | Some(FieldResult::Skipped)))
            .copied()
            .collect()
    }

    /// Whether no request failed and every changed attribute was applied
    pub fn is_complete(&self) -> bool {
        self.failed_fields().is_empty() && self.unapplied_fields().is_empty()
    }
}

/// Reconciler for managed AMQP instances
///
/// ## Threading
///
/// All operations take `&self` and keep their per-call state (deadlines,
/// backoff, endpoint override) on the stack, so one reconciler can serve
/// several instances concurrently. Exclusive access to a single instance is
/// the caller's responsibility.
pub struct InstanceReconciler {
    config: ReconcilerConfig,
    invoker: RetryingInvoker,
    queries: InstanceQueries,
    builder: RequestBuilder,
    translator: FieldTranslator,
    poller: ReadinessPoller,
    billing: Endpoints,
    event_tx: Option<mpsc::Sender<ReconcileEvent>>,
}

impl InstanceReconciler {
    /// Create a reconciler over a transport
    pub fn new(transport: Arc<dyn ApiTransport>, config: ReconcilerConfig) -> Result<Self> {
        config.validate()?;

        let invoker = RetryingInvoker::new(transport, config.retry.clone());
        let translator = FieldTranslator::new(&config.translation);
        let billing = Endpoints::with_alternate(
            config.endpoints.billing.clone(),
            config.endpoints.billing_international.clone(),
        );
        let queries = InstanceQueries::new(
            invoker.clone(),
            billing.clone(),
            Endpoints::single(config.amqp_endpoint()),
            config.product.clone(),
        );
        let builder = RequestBuilder::new(
            config.region.clone(),
            config.product.clone(),
            translator.clone(),
        );
        let poller = ReadinessPoller::from_config(&config.poll);

        Ok(Self {
            config,
            invoker,
            queries,
            builder,
            translator,
            poller,
            billing,
            event_tx: None,
        })
    }

    /// Attach an event channel
    ///
    /// Events are dropped with a warning when the channel is full.
    pub fn with_events(mut self, capacity: usize) -> (Self, mpsc::Receiver<ReconcileEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.event_tx = Some(tx);
        (self, rx)
    }

    /// Configuration in use
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Provision an instance and wait until it is ready
    ///
    /// The whole operation, readiness wait and read-back included, shares
    /// the create deadline.
    pub async fn create(&self, declared: &InstanceConfig) -> Result<InstanceState> {
        let deadline = Instant::now() + self.config.timeouts.create();
        let request = self.builder.create(declared)?;

        info!(
            instance_type = declared.instance_type.as_str(),
            region = %self.config.region,
            "Creating AMQP instance"
        );
        let response = self.invoker.invoke(&self.billing, &request, deadline).await?;
        ensure_success(&request, &response)?;

        let instance_id = value_text(&response["Data"]["InstanceId"]);
        if instance_id.is_empty() {
            return Err(Error::invalid_response(format!(
                "{}: response carries no Data.InstanceId: {}",
                request.action, response
            )));
        }
        info!(%instance_id, "AMQP instance created, waiting for readiness");
        self.emit_event(ReconcileEvent::Created {
            instance_id: instance_id.clone(),
        });

        let queries = &self.queries;
        let id = instance_id.as_str();
        let readiness = self
            .poller
            .wait_for(id, deadline, move || queries.instance_status(id, deadline))
            .await?;
        self.emit_event(ReconcileEvent::Ready {
            instance_id: instance_id.clone(),
            polls: readiness.polls,
        });

        match self.read_until(&instance_id, deadline).await? {
            ReadOutcome::Found(state) => Ok(state),
            ReadOutcome::Gone => Err(Error::not_found(format!(
                "AMQP instance {instance_id} disappeared after becoming ready"
            ))),
        }
    }

    /// Rebuild local state from the provider
    ///
    /// A missing instance is not an error: the outcome is
    /// [`ReadOutcome::Gone`] and the caller clears its identity.
    pub async fn read(&self, instance_id: &str) -> Result<ReadOutcome> {
        let deadline = Instant::now() + self.config.timeouts.read();
        self.read_until(instance_id, deadline).await
    }

    async fn read_until(&self, instance_id: &str, deadline: Instant) -> Result<ReadOutcome> {
        let remote = match self.queries.describe_instance(instance_id, deadline).await {
            Ok(remote) => remote,
            Err(err) if err.is_not_found() => {
                debug!(instance_id, "AMQP instance not found: {}", err);
                self.emit_event(ReconcileEvent::Gone {
                    instance_id: instance_id.to_string(),
                });
                return Ok(ReadOutcome::Gone);
            }
            Err(err) => return Err(err),
        };
        let billing = self
            .queries
            .query_available_instances(instance_id, deadline)
            .await?;

        Ok(ReadOutcome::Found(InstanceState {
            instance_id: remote.instance_id,
            instance_type: self.translator.tier_response(&remote.instance_type),
            status: remote.status,
            support_eip: remote.support_eip,
            payment_type: billing.subscription_type,
            renewal_duration: billing.renewal_duration,
            renewal_duration_unit: remote
                .renewal_duration_unit
                .map(|unit| self.translator.renewal_unit_response(&unit)),
            renewal_status: billing.renew_status,
            max_tps: remote.max_tps,
            max_eip_tps: remote.max_eip_tps,
            queue_capacity: remote.max_queue,
            storage_size: remote.storage_size,
        }))
    }

    /// Adopt an existing instance by id
    ///
    /// The id is used as-is; this is a read.
    pub async fn import(&self, instance_id: &str) -> Result<ReadOutcome> {
        self.read(instance_id).await
    }

    /// Apply the difference between two declared configurations
    pub async fn update(
        &self,
        instance_id: &str,
        prior: &InstanceConfig,
        planned: &InstanceConfig,
    ) -> Result<UpdateReport> {
        let changes = ChangeSet::between(prior, planned);
        self.update_with_changes(instance_id, planned, &changes).await
    }

    /// Apply an already computed change set
    ///
    /// Configuration errors are raised before any remote call. After that,
    /// the renewal and capacity requests are applied independently; a
    /// failure in one is reported per attribute and does not undo or
    /// prevent the other.
    pub async fn update_with_changes(
        &self,
        instance_id: &str,
        planned: &InstanceConfig,
        changes: &ChangeSet,
    ) -> Result<UpdateReport> {
        planned.validate()?;
        if changes.has(Field::InstanceType) {
            return Err(Error::config(
                "instance_type cannot be changed in place; the instance must be replaced",
            ));
        }

        let renewal = self.builder.renewal(instance_id, planned, changes);
        let modify = self.builder.modify(instance_id, planned, changes)?;

        let mut report = UpdateReport {
            changed: changes.iter().collect(),
            ..UpdateReport::default()
        };
        for (fields, request) in [(Field::RENEWAL, renewal), (Field::CAPACITY, modify)] {
            let Some(request) = request else {
                report.record(fields, &FieldResult::Skipped);
                continue;
            };

            let result = match self.apply(&request).await {
                Ok(()) => {
                    info!(instance_id, action = %request.action, "Update applied");
                    self.emit_event(ReconcileEvent::UpdateApplied {
                        instance_id: instance_id.to_string(),
                        action: request.action.clone(),
                    });
                    FieldResult::Applied
                }
                Err(err) => {
                    warn!(instance_id, action = %request.action, "Update failed: {}", err);
                    self.emit_event(ReconcileEvent::UpdateFailed {
                        instance_id: instance_id.to_string(),
                        action: request.action.clone(),
                        error: err.to_string(),
                    });
                    FieldResult::Failed(err.to_string())
                }
            };
            report.record(fields, &result);
        }
        for field in changes.iter() {
            if report.result(field).is_none() {
                warn!(instance_id, %field, "Change has no update request and was not applied");
                report.record(&[field], &FieldResult::Skipped);
            }
        }

        match self.read(instance_id).await {
            Ok(outcome) => report.state = outcome.into_state(),
            Err(err) => {
                warn!(instance_id, "Read after update failed: {}", err);
                report.refresh_error = Some(err.to_string());
            }
        }

        Ok(report)
    }

    /// Release local identity
    ///
    /// The provider offers no way to destroy these instances, so the remote
    /// instance stays provisioned and billed.
    pub async fn delete(&self, instance_id: &str) -> Result<()> {
        warn!(
            instance_id,
            "Cannot destroy AMQP instance; it is removed from local state but remains provisioned"
        );
        self.emit_event(ReconcileEvent::Released {
            instance_id: instance_id.to_string(),
        });
        Ok(())
    }

    async fn apply(&self, request: &ApiRequest) -> Result<()> {
        let response = self
            .invoker
            .invoke_within(&self.billing, request, self.config.timeouts.update())
            .await?;
        ensure_success(request, &response)
    }

    fn emit_event(&self, event: ReconcileEvent) {
        if let Some(tx) = &self.event_tx
            && tx.try_send(event).is_err()
        {
            warn!("Event channel full or closed, dropping reconcile event");
        }
    }
}

impl std::fmt::Debug for InstanceReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceReconciler")
            .field("region", &self.config.region)
            .field("invoker", &self.invoker)
            .field("billing", &self.billing)
            .finish()
    }
}
