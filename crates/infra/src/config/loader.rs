//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `LANDFALL_DB_PATH` is unset, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//! 5. With no file anywhere, runs on built-in defaults
//!
//! ## Environment Variables
//! - `LANDFALL_DB_PATH`: Database file path (required for env loading)
//! - `LANDFALL_DB_POOL_SIZE`: Connection pool size
//! - `LANDFALL_UPSTREAM_URL`: Catalogue URL
//! - `LANDFALL_UPSTREAM_TIMEOUT_SECS`: Per-request timeout
//! - `LANDFALL_SYNC_INTERVAL_MINUTES`: Minutes between passes
//! - `LANDFALL_SYNC_ENABLED`: Whether the scheduled loop runs (true/false)
//! - `LANDFALL_SYNC_RUN_LOCK_TIMEOUT_SECS`: How long a pass waits for the run lock
//! - `LANDFALL_RETRY_MAX_ATTEMPTS`: Upstream attempts per pass
//! - `LANDFALL_RETRY_INITIAL_DELAY_MS`: First backoff delay
//! - `LANDFALL_BREAKER_FAILURE_THRESHOLD`: Failures before the circuit opens
//! - `LANDFALL_BREAKER_OPEN_DURATION_SECS`: How long the circuit stays open
//! - `LANDFALL_LOG_LEVEL`: Default log filter
//! - `LANDFALL_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! Unset optional variables keep their defaults.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./landfall.json` or `./landfall.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use landfall_domain::{Config, LandfallError, Result};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["config.json", "config.toml", "landfall.json", "landfall.toml"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the database path
/// is not set there, falls back to a config file, and finally to
/// [`Config::default`] when no file exists.
///
/// # Errors
/// Returns `LandfallError::Config` if a variable or file is present but
/// invalid.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            return Ok(config);
        }
        Err(e) if std::env::var_os("LANDFALL_DB_PATH").is_some() => return Err(e),
        Err(e) => tracing::debug!(error = ?e, "Environment incomplete, trying file"),
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("No configuration file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration from environment variables
///
/// `LANDFALL_DB_PATH` is required; every other variable is optional.
///
/// # Errors
/// Returns `LandfallError::Config` if the database path is missing or a
/// numeric variable does not parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("LANDFALL_DB_PATH")?;
    env_parse("LANDFALL_DB_POOL_SIZE", &mut config.database.pool_size)?;

    if let Ok(url) = std::env::var("LANDFALL_UPSTREAM_URL") {
        config.upstream.url = url;
    }
    env_parse("LANDFALL_UPSTREAM_TIMEOUT_SECS", &mut config.upstream.timeout_secs)?;

    env_parse("LANDFALL_SYNC_INTERVAL_MINUTES", &mut config.sync.interval_minutes)?;
    config.sync.enabled = env_bool("LANDFALL_SYNC_ENABLED", config.sync.enabled);
    env_parse("LANDFALL_SYNC_RUN_LOCK_TIMEOUT_SECS", &mut config.sync.run_lock_timeout_secs)?;

    let retry = &mut config.resilience.retry;
    env_parse("LANDFALL_RETRY_MAX_ATTEMPTS", &mut retry.max_attempts)?;
    env_parse("LANDFALL_RETRY_INITIAL_DELAY_MS", &mut retry.initial_delay_ms)?;

    let breaker = &mut config.resilience.circuit_breaker;
    env_parse("LANDFALL_BREAKER_FAILURE_THRESHOLD", &mut breaker.failure_threshold)?;
    env_parse("LANDFALL_BREAKER_OPEN_DURATION_SECS", &mut breaker.open_duration_secs)?;

    if let Ok(level) = std::env::var("LANDFALL_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("LANDFALL_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
/// Sections missing from the file keep their defaults.
///
/// # Errors
/// Returns `LandfallError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(LandfallError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            LandfallError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| LandfallError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| LandfallError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| LandfallError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(LandfallError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory and its parent, then the
/// executable's directory and its parent.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
    }

    let exe_dir = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf));
    if let Some(exe_dir) = exe_dir {
        roots.push(exe_dir.clone());
        roots.push(exe_dir.join(".."));
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `LandfallError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        LandfallError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Overwrite `target` with the parsed value of `key` when it is set.
fn env_parse<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| LandfallError::Config(format!("Invalid value for {}: {}", key, e)))?;
    }
    Ok(())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
