//! `recall daemon` — Periodic retention sweeps until Ctrl-C.

use super::{CommandResult, load_config, open_engine};
use recall_memory::RetentionSweeper;
use std::time::Duration;
use tracing::{info, warn};

pub async fn run() -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;

    let max_age_days = config.retention.max_age_days;
    let interval_hours = config.retention.sweep_interval_hours.max(1);

    println!("🧠 recall daemon — starting");
    println!("   Backend:   {}", engine.store().name());
    println!("   Retention: {max_age_days} days");
    println!("   Sweep:     every {interval_hours}h");

    let sweeper = RetentionSweeper::new(
        engine.clone(),
        chrono::Duration::days(i64::from(max_age_days)),
        Duration::from_secs(u64::from(interval_hours) * 3600),
    );
    let handle = sweeper.start();
    info!("Retention sweeper started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    handle.shutdown().await;
    if let Err(e) = engine.persist_index().await {
        warn!(error = %e, "Failed to write index snapshot on shutdown");
    }

    println!("👋 recall daemon stopped");
    Ok(())
}
