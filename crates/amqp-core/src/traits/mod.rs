//! Core traits for AMQP instance reconciliation
//!
//! - [`ApiTransport`]: Deliver RPC-style requests to the provider

pub mod transport;

pub use transport::{ApiRequest, ApiTransport, CallError, ErrorClass, Service, classify, value_text};
