//! HTTP client for the meteorite-landings catalogue
//!
//! One call downloads the whole catalogue as a JSON array. The client makes
//! exactly one request per fetch; retries and circuit breaking are applied
//! by the reconciliation service around it.

use std::time::Duration;

use async_trait::async_trait;
use landfall_core::LandingSource;
use landfall_domain::constants::{
    DEFAULT_UPSTREAM_TIMEOUT_SECS, DEFAULT_UPSTREAM_URL, DEFAULT_USER_AGENT,
};
use landfall_domain::{ExternalLanding, LandfallError, Result, UpstreamConfig};
use reqwest::header::ACCEPT;
use reqwest::{Client as ReqwestClient, StatusCode};
use tracing::{debug, instrument, warn};

use crate::errors::InfraError;

/// Upstream catalogue client
#[derive(Clone)]
pub struct NasaLandingsClient {
    client: ReqwestClient,
    url: String,
}

impl NasaLandingsClient {
    /// Client for the public catalogue with default timeout and user agent.
    pub fn new() -> Result<Self> {
        Self::with_settings(
            DEFAULT_UPSTREAM_URL,
            Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            DEFAULT_USER_AGENT,
        )
    }

    /// Client built from the `upstream` config section.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        Self::with_settings(&config.url, config.timeout(), &config.user_agent)
    }

    /// Client for `url` with a per-request `timeout`.
    pub fn with_settings(
        url: impl Into<String>,
        timeout: Duration,
        user_agent: impl Into<String>,
    ) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .user_agent(user_agent.into())
            .no_proxy()
            .build()
            .map_err(|err| LandfallError::from(InfraError::from(err)))?;

        Ok(Self { client, url: url.into() })
    }

    /// Catalogue URL this client downloads.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LandingSource for NasaLandingsClient {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_snapshot(&self) -> Result<Option<Vec<ExternalLanding>>> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let body = response.bytes().await.map_err(map_http_error)?;
        let snapshot: Option<Vec<ExternalLanding>> = serde_json::from_slice(&body)
            .map_err(|err| LandfallError::Format(format!("invalid catalogue payload: {err}")))?;

        debug!(
            bytes = body.len(),
            items = snapshot.as_ref().map_or(0, Vec::len),
            "catalogue downloaded"
        );
        Ok(snapshot)
    }
}

fn status_error(status: StatusCode) -> LandfallError {
    let code = status.as_u16();
    if matches!(code, 502..=504) {
        warn!(status = code, "upstream gateway unavailable");
    } else {
        warn!(status = code, "upstream returned an error status");
    }
    LandfallError::Network(format!(
        "HTTP {} {}",
        code,
        status.canonical_reason().unwrap_or("unknown status")
    ))
}

fn map_http_error(err: reqwest::Error) -> LandfallError {
    LandfallError::from(InfraError::from(err))
}
