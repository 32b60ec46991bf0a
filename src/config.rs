//! Configuration types for the reputation lookups.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// DNS blackhole list checks.
    #[serde(default)]
    pub rbl: RblConfig,

    /// AbuseIPDB provider configuration.
    #[serde(default)]
    pub abuseipdb: Option<AbuseIPDBConfig>,

    /// AlienVault OTX provider configuration.
    #[serde(default)]
    pub otx: Option<OtxConfig>,

    /// IPQualityScore provider configuration.
    #[serde(default)]
    pub ipqs: Option<IpqsConfig>,

    /// IPInfo geolocation provider configuration.
    #[serde(default)]
    pub ipinfo: IpInfoConfig,
}

/// DNS blackhole list configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RblConfig {
    /// Enable RBL checks.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Blacklists to query. Unset means the built-in list.
    #[serde(default)]
    pub blacklists: Option<Vec<String>>,

    /// Maximum DNS queries in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-query resolver timeout in milliseconds. Unset keeps the resolver default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Send queries to this name server instead of the system resolvers.
    #[serde(default)]
    pub nameserver: Option<SocketAddr>,
}

impl Default for RblConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blacklists: None,
            concurrency: default_concurrency(),
            timeout_ms: None,
            nameserver: None,
        }
    }
}

fn default_concurrency() -> usize {
    1
}

/// AbuseIPDB provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AbuseIPDBConfig {
    /// Enable AbuseIPDB lookups.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API key (supports ${ENV_VAR} syntax).
    pub api_key: String,

    /// Only consider reports from the last N days.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    /// API request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_abuseipdb_url")]
    pub base_url: String,
}

impl AbuseIPDBConfig {
    /// Enabled configuration with defaults and the given key.
    pub fn with_key(api_key: impl Into<String>) -> Self {
        Self {
            enabled: true,
            api_key: api_key.into(),
            max_age_days: default_max_age_days(),
            timeout_ms: default_timeout(),
            base_url: default_abuseipdb_url(),
        }
    }
}

fn default_max_age_days() -> u32 {
    90
}

fn default_abuseipdb_url() -> String {
    "https://api.abuseipdb.com".to_string()
}

/// AlienVault OTX provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OtxConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API key (supports ${ENV_VAR} syntax).
    pub api_key: String,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_otx_url")]
    pub base_url: String,
}

impl OtxConfig {
    pub fn with_key(api_key: impl Into<String>) -> Self {
        Self {
            enabled: true,
            api_key: api_key.into(),
            timeout_ms: default_timeout(),
            base_url: default_otx_url(),
        }
    }
}

fn default_otx_url() -> String {
    "https://otx.alienvault.com".to_string()
}

/// IPQualityScore provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IpqsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API key (supports ${ENV_VAR} syntax).
    pub api_key: String,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_ipqs_url")]
    pub base_url: String,
}

impl IpqsConfig {
    pub fn with_key(api_key: impl Into<String>) -> Self {
        Self {
            enabled: true,
            api_key: api_key.into(),
            timeout_ms: default_timeout(),
            base_url: default_ipqs_url(),
        }
    }
}

fn default_ipqs_url() -> String {
    "https://ipqualityscore.com".to_string()
}

/// IPInfo geolocation configuration. Works without a token at a lower rate limit.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IpInfoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Optional access token.
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_ipinfo_url")]
    pub base_url: String,
}

impl Default for IpInfoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
            timeout_ms: default_timeout(),
            base_url: default_ipinfo_url(),
        }
    }
}

fn default_ipinfo_url() -> String {
    "https://ipinfo.io".to_string()
}

fn default_timeout() -> u64 {
    10000
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse YAML configuration, expanding `${VAR}` references first.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content)?;
        let mut config: Config = serde_yaml::from_str(&expanded)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Drop an empty IPInfo token left behind by an unset `${VAR}`.
    fn normalize(&mut self) {
        if self.ipinfo.token.as_deref().is_some_and(str::is_empty) {
            self.ipinfo.token = None;
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rbl.concurrency == 0 {
            anyhow::bail!("rbl.concurrency must be at least 1");
        }

        if let Some(ref lists) = self.rbl.blacklists {
            if lists.iter().all(|l| l.trim().is_empty()) {
                anyhow::bail!("rbl.blacklists is set but contains no blacklist names");
            }
        }

        if let Some(ref abuseipdb) = self.abuseipdb {
            if abuseipdb.enabled && abuseipdb.api_key.is_empty() {
                anyhow::bail!("AbuseIPDB is enabled but api_key is empty");
            }
        }

        if let Some(ref otx) = self.otx {
            if otx.enabled && otx.api_key.is_empty() {
                anyhow::bail!("AlienVault OTX is enabled but api_key is empty");
            }
        }

        if let Some(ref ipqs) = self.ipqs {
            if ipqs.enabled && ipqs.api_key.is_empty() {
                anyhow::bail!("IPQualityScore is enabled but api_key is empty");
            }
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# IP reputation lookup configuration

# DNS blackhole lists
rbl:
  enabled: true
  concurrency: 1               # DNS queries in flight; 1 queries lists one by one
  # timeout_ms: 5000           # Per-query timeout; resolver default when unset
  # nameserver: "127.0.0.1:53" # Query this server instead of the system resolvers
  # blacklists:                # Replaces the built-in list when set
  #   - "zen.spamhaus.org"
  #   - "bl.spamcop.net"

# AbuseIPDB (optional)
abuseipdb:
  enabled: true
  api_key: "${ABUSEIPDB_API_KEY}"  # Use environment variable
  max_age_days: 90             # Only consider reports from last 90 days
  timeout_ms: 10000

# AlienVault OTX (optional)
otx:
  enabled: true
  api_key: "${OTX_API_KEY}"
  timeout_ms: 10000

# IPQualityScore (optional)
ipqs:
  enabled: true
  api_key: "${IPQS_API_KEY}"
  timeout_ms: 10000

# IPInfo geolocation; token is optional
ipinfo:
  enabled: true
  token: "${IPINFO_TOKEN}"
  timeout_ms: 10000
"#
        .to_string()
    }
}

/// Credentials given on the command line or through the environment.
///
/// Each key that is set and non-empty switches its provider on, creating
/// the provider section with defaults when the config file has none.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub abuseipdb: Option<String>,
    pub otx: Option<String>,
    pub ipqs: Option<String>,
    pub ipinfo_token: Option<String>,
}

impl ApiKeys {
    /// Fold the keys into `config`, overriding keys read from the file.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(key) = non_empty(&self.abuseipdb) {
            match config.abuseipdb {
                Some(ref mut c) => {
                    c.enabled = true;
                    c.api_key = key.to_string();
                }
                None => config.abuseipdb = Some(AbuseIPDBConfig::with_key(key)),
            }
        }

        if let Some(key) = non_empty(&self.otx) {
            match config.otx {
                Some(ref mut c) => {
                    c.enabled = true;
                    c.api_key = key.to_string();
                }
                None => config.otx = Some(OtxConfig::with_key(key)),
            }
        }

        if let Some(key) = non_empty(&self.ipqs) {
            match config.ipqs {
                Some(ref mut c) => {
                    c.enabled = true;
                    c.api_key = key.to_string();
                }
                None => config.ipqs = Some(IpqsConfig::with_key(key)),
            }
        }

        if let Some(token) = non_empty(&self.ipinfo_token) {
            config.ipinfo.token = Some(token.to_string());
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> anyhow::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")?;
    let expanded = re.replace_all(content, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_default()
    });
    Ok(expanded.into_owned())
}
