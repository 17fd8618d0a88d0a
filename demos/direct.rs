use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use tracing_insightops::dsn::parse_dsn;
use tracing_insightops::init::{init_tracing_with_config, LayerConfig};
use tracing_insightops::level::Severity;
use tracing_insightops::record::LogRecord;

/// Ships events straight to the regional collector over TLS.
///
/// ```text
/// INSIGHTOPS_DSN="insightops://<token>@eu?priority=warn" cargo run --example direct
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dsn = std::env::var("INSIGHTOPS_DSN")
        .unwrap_or_else(|_| "insightops://00000000-0000-0000-0000-000000000000@eu".to_string());
    let sink = Arc::new(parse_dsn(&dsn)?.connect().await?);

    init_tracing_with_config(sink.clone(), LayerConfig { enable_stdout: true })?;

    info!("starting service");
    error!(user_id = 42, reason = "invalid password", "authentication failed");

    // Records can also be fired directly, bypassing `tracing`.
    let record = LogRecord::new(Severity::Fatal, "shutting down after unrecoverable error")
        .with_field("exit_code", 70);
    sink.fire(&record).await?;

    sleep(Duration::from_millis(500)).await;
    sink.flush_and_close().await?;
    Ok(())
}
