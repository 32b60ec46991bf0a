//! IPInfo geolocation provider.

use super::{endpoint, fetch_json, http_client, parse_target, ProviderError, ReputationProvider};
use crate::config::IpInfoConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

pub struct IpInfoProvider {
    config: IpInfoConfig,
    client: Client,
}

impl IpInfoProvider {
    pub fn new(config: IpInfoConfig) -> Result<Self, ProviderError> {
        let client = http_client(config.timeout_ms)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ReputationProvider for IpInfoProvider {
    async fn check(&self, target: &str) -> Result<Value, ProviderError> {
        let ip = parse_target(target)?;
        let url = endpoint(&self.config.base_url, &format!("{}/json", ip));

        debug!(ip = %ip, authenticated = self.config.token.is_some(), "Querying IPInfo");

        let mut request = self.client.get(&url);
        if let Some(ref token) = self.config.token {
            request = request.query(&[("token", token)]);
        }

        fetch_json(self.name(), request).await
    }

    fn name(&self) -> &str {
        "ipinfo"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn failure_message(&self, target: &str) -> String {
        format!("Failed to retrieve geolocation for {}", target)
    }
}
