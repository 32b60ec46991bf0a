//! IPQualityScore provider.
//!
//! IPQualityScore takes the API key as a path segment rather than a header.

use super::{endpoint, fetch_json, http_client, parse_target, ProviderError, ReputationProvider};
use crate::config::IpqsConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

pub struct IpqsProvider {
    config: IpqsConfig,
    client: Client,
}

impl IpqsProvider {
    pub fn new(config: IpqsConfig) -> Result<Self, ProviderError> {
        let client = http_client(config.timeout_ms)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ReputationProvider for IpqsProvider {
    async fn check(&self, target: &str) -> Result<Value, ProviderError> {
        let ip = parse_target(target)?;
        let url = endpoint(
            &self.config.base_url,
            &format!("api/json/ip/{}/{}", self.config.api_key, ip),
        );

        // The URL carries the key, so only the address is logged.
        debug!(ip = %ip, "Querying IPQualityScore");

        let body = fetch_json(self.name(), self.client.get(&url)).await?;

        // IPQS reports request failures in-band with HTTP 200.
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            warn!(
                ip = %ip,
                message = ?body.get("message"),
                "IPQualityScore reported an unsuccessful lookup"
            );
        }

        Ok(body)
    }

    fn name(&self) -> &str {
        "ipqs"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn failure_message(&self, target: &str) -> String {
        format!("Failed to query IPQualityScore for {}", target)
    }
}
