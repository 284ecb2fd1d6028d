use landfall_core::PassReport;
use landfall_domain::{LandfallError, LoggingConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level is used. With
/// `logging.json` the output is one JSON object per line.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), &config.level);

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}

/// Filter from `RUST_LOG`, falling back to `level`, then to `info`.
pub fn build_filter(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .filter(|directive| !directive.trim().is_empty())
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Convert a `LandfallError` into a stable label suitable for logging.
#[inline]
pub fn error_label(error: &LandfallError) -> &'static str {
    match error {
        LandfallError::Database(_) => "database",
        LandfallError::Config(_) => "config",
        LandfallError::Network(_) => "network",
        LandfallError::Timeout(_) => "timeout",
        LandfallError::Format(_) => "format",
        LandfallError::NotFound(_) => "not_found",
        LandfallError::InvalidInput(_) => "invalid_input",
        LandfallError::Internal(_) => "internal",
    }
}

/// Log the outcome of a one-shot pass.
pub fn log_pass_report(report: &PassReport) {
    info!(
        fetched = report.fetched,
        added = report.added,
        updated = report.updated,
        deleted = report.deleted,
        unchanged = report.stats.unchanged,
        validation_errors = report.stats.validation_errors,
        "one-shot reconciliation finished"
    );
}
