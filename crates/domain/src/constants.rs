//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Record rules
pub const MAX_NAME_LENGTH: usize = 500;
pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;
pub const MIN_YEAR: i32 = 1;

// Sync schedule
pub const DEFAULT_SYNC_INTERVAL_MINUTES: i64 = 60;
pub const DEFAULT_RUN_LOCK_TIMEOUT_SECS: u64 = 5;

// Resilience defaults
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 1_000;
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_OPEN_DURATION_SECS: u64 = 60;

/// Circuit breaker / log name of the upstream catalogue dependency
pub const UPSTREAM_DEPENDENCY: &str = "nasa-meteorite-landings";

// Upstream endpoint
pub const DEFAULT_UPSTREAM_URL: &str = "https://data.nasa.gov/resource/y77d-th95.json";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = "landfall-sync/0.1";
