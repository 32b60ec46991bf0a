//! IP reputation providers.

pub mod abuseipdb;
pub mod ipinfo;
pub mod ipqs;
pub mod otx;
pub mod rbl;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;
use tracing::warn;

/// Error from a reputation provider.
#[derive(Debug)]
pub enum ProviderError {
    /// HTTP request failed.
    Http(reqwest::Error),
    /// Timeout.
    Timeout,
    /// Rate limited.
    RateLimited,
    /// Invalid response.
    InvalidResponse(String),
    /// The lookup target is not an IP address.
    InvalidTarget(String),
    /// Other error.
    Other(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Http(e) => write!(f, "HTTP error: {}", e),
            ProviderError::Timeout => write!(f, "Request timed out"),
            ProviderError::RateLimited => write!(f, "Rate limited"),
            ProviderError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            ProviderError::InvalidTarget(target) => write!(f, "Not an IP address: {}", target),
            ProviderError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Http(e)
        }
    }
}

/// Trait for IP reputation providers.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    /// Look up the reputation of `target` and return the provider's JSON report.
    async fn check(&self, target: &str) -> Result<Value, ProviderError>;

    /// Provider name, used as the key in aggregate reports.
    fn name(&self) -> &str;

    /// Whether this provider is enabled.
    fn is_enabled(&self) -> bool;

    /// Message reported to the user when `check` fails.
    fn failure_message(&self, target: &str) -> String {
        format!("Failed to query {} for {}", self.name(), target)
    }
}

/// Parse a lookup target before it is spliced into a request URL.
pub(crate) fn parse_target(target: &str) -> Result<IpAddr, ProviderError> {
    target
        .parse()
        .map_err(|_| ProviderError::InvalidTarget(target.to_string()))
}

/// Build the shared HTTP client for a provider.
pub(crate) fn http_client(timeout_ms: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(concat!("ip-reputation-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ProviderError::from)
}

/// Send a request and decode the JSON body, mapping HTTP failures to `ProviderError`.
pub(crate) async fn fetch_json(provider: &str, request: RequestBuilder) -> Result<Value, ProviderError> {
    let response = request.send().await?;

    if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!(provider, "Rate limit exceeded");
        return Err(ProviderError::RateLimited);
    }

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::InvalidResponse(format!(
            "HTTP {}: {}",
            status, body
        )));
    }

    response.json().await.map_err(|e| {
        ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
    })
}

/// Join a configured base URL and a path without doubling slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
