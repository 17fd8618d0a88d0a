use std::sync::Arc;
use tracing::{debug, error, info, warn};

use tracing_insightops::config::ShipperConfig;
use tracing_insightops::init::init_tracing;

/// Ships events through a datahub configured from the environment, e.g.
///
/// ```text
/// INSIGHTOPS_TOKEN=... INSIGHTOPS_REGION=eu \
/// INSIGHTOPS_DATAHUB_HOST=127.0.0.1 INSIGHTOPS_DATAHUB_PORT=10000 \
/// cargo run --example datahub
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(ShipperConfig::from_env()?.connect().await?);
    init_tracing(sink.clone())?;

    debug!("not shipped with the default info threshold");
    info!(service = "checkout", "service started");
    warn!(queue_depth = 912, "queue is backing up");
    error!(order_id = 123, reason = "card declined", "order failed");

    // Each event is delivered on its own task; give them a moment.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    sink.flush_and_close().await?;
    Ok(())
}
