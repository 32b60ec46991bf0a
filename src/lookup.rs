//! Runs one or all configured reputation providers against an address.

use crate::config::Config;
use crate::providers::abuseipdb::AbuseIPDBProvider;
use crate::providers::ipinfo::IpInfoProvider;
use crate::providers::ipqs::IpqsProvider;
use crate::providers::otx::OtxProvider;
use crate::providers::rbl::RblChecker;
use crate::providers::ReputationProvider;
use crate::resolver::HickoryLookup;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, info};

/// The lookups this tool knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Rbl,
    AbuseIpdb,
    Otx,
    Ipqs,
    IpInfo,
}

impl ProviderKind {
    /// Every provider, in the order aggregate lookups run them.
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Rbl,
        ProviderKind::AbuseIpdb,
        ProviderKind::Otx,
        ProviderKind::Ipqs,
        ProviderKind::IpInfo,
    ];

    /// Key used for this provider in reports.
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Rbl => "rbl",
            ProviderKind::AbuseIpdb => "abuseipdb",
            ProviderKind::Otx => "otx",
            ProviderKind::Ipqs => "ipqs",
            ProviderKind::IpInfo => "ipinfo",
        }
    }
}

/// Build `kind` from `config`. `None` when it is absent or disabled.
fn build_provider(
    kind: ProviderKind,
    config: &Config,
) -> anyhow::Result<Option<Box<dyn ReputationProvider>>> {
    let provider: Box<dyn ReputationProvider> = match kind {
        ProviderKind::Rbl => {
            if !config.rbl.enabled {
                return Ok(None);
            }
            let timeout = config.rbl.timeout_ms.map(Duration::from_millis);
            let lookup = HickoryLookup::new(config.rbl.nameserver, timeout)?;
            Box::new(RblChecker::from_config(&config.rbl, Box::new(lookup)))
        }
        ProviderKind::AbuseIpdb => match config.abuseipdb {
            Some(ref c) if c.enabled => Box::new(AbuseIPDBProvider::new(c.clone())?),
            _ => return Ok(None),
        },
        ProviderKind::Otx => match config.otx {
            Some(ref c) if c.enabled => Box::new(OtxProvider::new(c.clone())?),
            _ => return Ok(None),
        },
        ProviderKind::Ipqs => match config.ipqs {
            Some(ref c) if c.enabled => Box::new(IpqsProvider::new(c.clone())?),
            _ => return Ok(None),
        },
        ProviderKind::IpInfo => {
            if !config.ipinfo.enabled {
                return Ok(None);
            }
            Box::new(IpInfoProvider::new(config.ipinfo.clone())?)
        }
    };

    Ok(Some(provider))
}

/// A set of providers queried together.
pub struct ReputationLookup {
    providers: Vec<Box<dyn ReputationProvider>>,
}

impl ReputationLookup {
    /// Build every enabled provider.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut providers = Vec::new();

        for kind in ProviderKind::ALL {
            if let Some(provider) = build_provider(kind, config)? {
                info!(provider = kind.name(), "Provider enabled");
                providers.push(provider);
            }
        }

        if providers.is_empty() {
            anyhow::bail!("No providers are enabled");
        }

        Ok(Self::with_providers(providers))
    }

    /// Build a single provider, failing if it is not configured.
    pub fn single(config: &Config, kind: ProviderKind) -> anyhow::Result<Self> {
        match build_provider(kind, config)? {
            Some(provider) => Ok(Self::with_providers(vec![provider])),
            None => anyhow::bail!(
                "Provider '{}' is disabled or missing from the configuration",
                kind.name()
            ),
        }
    }

    pub fn with_providers(providers: Vec<Box<dyn ReputationProvider>>) -> Self {
        Self { providers }
    }

    /// Names of the providers this lookup runs, in order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Run the provider called `name` and return its report.
    pub async fn check_one(&self, name: &str, target: &str) -> Option<Value> {
        let provider = self.providers.iter().find(|p| p.name() == name)?;
        Some(run_provider(provider.as_ref(), target).await)
    }

    /// Run every enabled provider and key the reports by provider name.
    ///
    /// A failing provider contributes an `{"error": ...}` object; the
    /// remaining providers still run.
    pub async fn check_all(&self, target: &str) -> Map<String, Value> {
        let mut reports = Map::new();

        for provider in &self.providers {
            if !provider.is_enabled() {
                continue;
            }
            let report = run_provider(provider.as_ref(), target).await;
            reports.insert(provider.name().to_string(), report);
        }

        reports
    }
}

/// Run one provider, turning a failure into its user-facing error object.
pub async fn run_provider(provider: &dyn ReputationProvider, target: &str) -> Value {
    debug!(provider = provider.name(), target, "Running lookup");

    match provider.check(target).await {
        Ok(report) => report,
        Err(e) => {
            error!(
                provider = provider.name(),
                target,
                error = %e,
                "Provider lookup failed"
            );
            json!({ "error": provider.failure_message(target) })
        }
    }
}
