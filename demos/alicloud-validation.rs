// # Alibaba Cloud Transport Real Environment Validation Tool
//
// Reads an existing AMQP instance through the real billing and inventory
// APIs. Nothing is created or modified.
//
// ## Usage
//
// ```bash
// AMQP_REGION=cn-hangzhou \
// AMQP_INSTANCE_ID=amqp-cn-xxxxxxxx \
// AMQP_CONFIG=./gateway.json \
// cargo run --bin alicloud_validation
// ```
//
// ## Environment Variables
//
// Required:
// - `AMQP_REGION`: Region of the instance
// - `AMQP_INSTANCE_ID`: Instance to read
//
// Optional:
// - `AMQP_CONFIG`: Path to a JSON reconciler configuration
// - `AMQP_SCHEME`: `https` (default) or `http` for a local signing gateway
//
// Requests are sent unsigned; point the configured endpoints at a gateway
// that adds credentials.

use amqp_core::{InstanceReconciler, ReadOutcome, ReconcilerConfig};
use amqp_provider_alicloud::{AlicloudTransport, PassthroughSigner, TransportConfig};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    tracing::info!("=== Alibaba Cloud Transport Validation ===");

    let region = env::var("AMQP_REGION").unwrap_or_else(|_| {
        tracing::error!("AMQP_REGION environment variable is required");
        std::process::exit(1);
    });
    let instance_id = env::var("AMQP_INSTANCE_ID").unwrap_or_else(|_| {
        tracing::error!("AMQP_INSTANCE_ID environment variable is required");
        std::process::exit(1);
    });

    let mut config = match env::var("AMQP_CONFIG") {
        Ok(path) => ReconcilerConfig::from_json_file(path)?,
        Err(_) => ReconcilerConfig::new(region.clone()),
    };
    config.region = region;

    let transport_config = TransportConfig {
        scheme: env::var("AMQP_SCHEME").unwrap_or_else(|_| "https".to_string()),
        ..TransportConfig::default()
    };

    tracing::info!("Configuration:");
    tracing::info!("  Region: {}", config.region);
    tracing::info!("  Billing endpoint: {}", config.endpoints.billing);
    tracing::info!("  AMQP endpoint: {}", config.amqp_endpoint());
    tracing::info!("  Instance: {}", instance_id);

    let transport = AlicloudTransport::with_config(Arc::new(PassthroughSigner), transport_config)?;
    tracing::info!("Transport created: {:?}", transport);

    let reconciler = InstanceReconciler::new(Arc::new(transport), config)?;

    tracing::info!("--- Reading instance ---");
    match reconciler.read(&instance_id).await {
        Ok(ReadOutcome::Found(state)) => {
            tracing::info!("✓ Instance found");
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Ok(ReadOutcome::Gone) => {
            tracing::warn!("Instance {} does not exist", instance_id);
        }
        Err(e) => {
            tracing::error!("✗ Read failed: {}", e);
            std::process::exit(1);
        }
    }

    tracing::info!("--- Reading again (must be identical) ---");
    let first = reconciler.read(&instance_id).await?;
    let second = reconciler.read(&instance_id).await?;
    if first == second {
        tracing::info!("✓ Read is idempotent");
    } else {
        tracing::warn!("⚠ Consecutive reads differ (instance may be changing)");
    }

    Ok(())
}
