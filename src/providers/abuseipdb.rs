//! AbuseIPDB reputation provider.

use super::{endpoint, fetch_json, http_client, parse_target, ProviderError, ReputationProvider};
use crate::config::AbuseIPDBConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// AbuseIPDB reputation provider.
pub struct AbuseIPDBProvider {
    config: AbuseIPDBConfig,
    client: Client,
}

impl AbuseIPDBProvider {
    /// Create a new AbuseIPDB provider.
    pub fn new(config: AbuseIPDBConfig) -> Result<Self, ProviderError> {
        let client = http_client(config.timeout_ms)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ReputationProvider for AbuseIPDBProvider {
    async fn check(&self, target: &str) -> Result<Value, ProviderError> {
        let ip = parse_target(target)?;
        let url = endpoint(&self.config.base_url, "api/v2/check");

        debug!(ip = %ip, "Querying AbuseIPDB");

        let request = self
            .client
            .get(&url)
            .query(&[
                ("ipAddress", ip.to_string()),
                ("maxAgeInDays", self.config.max_age_days.to_string()),
            ])
            .header("Key", &self.config.api_key)
            .header("Accept", "application/json");

        let body = fetch_json(self.name(), request).await?;

        debug!(
            ip = %ip,
            score = ?body.pointer("/data/abuseConfidenceScore"),
            reports = ?body.pointer("/data/totalReports"),
            "AbuseIPDB lookup complete"
        );

        Ok(body)
    }

    fn name(&self) -> &str {
        "abuseipdb"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn failure_message(&self, target: &str) -> String {
        format!("Failed to query AbuseIPDB for {}", target)
    }
}
