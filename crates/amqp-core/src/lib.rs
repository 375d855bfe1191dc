// # amqp-core
//
// Reconciliation of declared managed-AMQP instances against a cloud
// provider's billing and provisioning APIs.
//
// ## Architecture Overview
//
// - **ApiTransport**: Trait for delivering one RPC-style request to the provider
// - **RetryingInvoker**: Retries transient failures, swaps endpoint on region mismatch
// - **ReadinessPoller**: Waits for a created instance to reach a ready status
// - **FieldTranslator**: Maps enumeration spellings between local and remote vocabularies
// - **RequestBuilder**: Assembles create, renewal and capacity requests
// - **InstanceReconciler**: Create / read / update / delete orchestration
//
// ## Design Principles
//
// 1. **Transport at the seam**: HTTP, signing and encoding live behind `ApiTransport`
// 2. **Deadline-bounded**: every retry and poll loop stops at a caller-supplied deadline
// 3. **Total translation**: unknown enumeration values pass through unchanged
// 4. **Partial updates are visible**: update outcomes are reported per attribute
// 5. **Library-First**: the declarative engine driving this crate is external

pub mod changes;
pub mod config;
pub mod error;
pub mod invoker;
pub mod model;
pub mod poller;
pub mod reconciler;
pub mod request;
pub mod service;
pub mod traits;
pub mod translate;

// Re-export core types for convenience
pub use changes::{ChangeSet, Field};
pub use config::ReconcilerConfig;
pub use error::{Error, Result};
pub use invoker::{Endpoints, RetryingInvoker};
pub use model::{InstanceConfig, InstanceState, InstanceTier};
pub use poller::{Readiness, ReadinessPoller};
pub use reconciler::{FieldResult, InstanceReconciler, ReadOutcome, ReconcileEvent, UpdateReport};
pub use request::RequestBuilder;
pub use traits::{ApiRequest, ApiTransport, CallError};
pub use translate::FieldTranslator;
