//! AlienVault OTX reputation provider.

use super::{endpoint, fetch_json, http_client, parse_target, ProviderError, ReputationProvider};
use crate::config::OtxConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::net::IpAddr;
use tracing::debug;

pub struct OtxProvider {
    config: OtxConfig,
    client: Client,
}

impl OtxProvider {
    pub fn new(config: OtxConfig) -> Result<Self, ProviderError> {
        let client = http_client(config.timeout_ms)?;
        Ok(Self { config, client })
    }
}

/// OTX indicator section for an address family.
fn indicator_section(ip: &IpAddr) -> &'static str {
    match ip {
        IpAddr::V4(_) => "IPv4",
        IpAddr::V6(_) => "IPv6",
    }
}

#[async_trait]
impl ReputationProvider for OtxProvider {
    async fn check(&self, target: &str) -> Result<Value, ProviderError> {
        let ip = parse_target(target)?;
        let url = endpoint(
            &self.config.base_url,
            &format!("api/v1/indicators/{}/{}/reputation", indicator_section(&ip), ip),
        );

        debug!(ip = %ip, "Querying AlienVault OTX");

        let request = self.client.get(&url).header("X-OTX-API-KEY", &self.config.api_key);
        fetch_json(self.name(), request).await
    }

    fn name(&self) -> &str {
        "otx"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn failure_message(&self, target: &str) -> String {
        format!("Failed to query AlienVault for {}", target)
    }
}
