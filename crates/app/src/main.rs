//! Landfall - meteorite-landing catalogue sync daemon
//!
//! Main entry point. Runs the reconciliation worker until Ctrl-C, or a
//! single pass when `sync.enabled` is false.

use landfall_app::utils::logging::{error_label, init_logging, log_pass_report};
use landfall_app::AppContext;
use landfall_infra::{config, SchedulerError};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading any LANDFALL_* variable
    let dotenv = dotenvy::dotenv();

    let config = config::load()?;
    init_logging(&config.logging)?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) => info!(error = %err, "no .env file loaded"),
    }

    let sync_enabled = config.sync.enabled;
    let mut ctx = AppContext::new(config).inspect_err(|err| {
        error!(category = error_label(err), error = %err, "startup failed");
    })?;

    if !sync_enabled {
        info!("scheduled sync disabled, running a single pass");
        let report = ctx.run_once().await?;
        log_pass_report(&report);
        return Ok(());
    }

    ctx.start().await?;
    info!("landfall running, press Ctrl-C to stop");

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl-C, shutting down");
    }

    match ctx.shutdown().await {
        Ok(()) => info!("landfall stopped"),
        Err(SchedulerError::Timeout { duration }) => {
            warn!(timeout_secs = duration.as_secs(), "worker did not stop in time");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
