//! Drowsiness Monitor - Main Entry Point

use std::path::PathBuf;

use anyhow::Context;
use monitor::{init_logging, run_monitor, MonitorConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("DROWSY_CONFIG"))
        .map(PathBuf::from);

    let config = MonitorConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    let summary = run_monitor(config).await.context("monitor stopped with an error")?;

    info!("Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    Ok(())
}
