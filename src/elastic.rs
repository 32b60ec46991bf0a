//! Store JSON reports in an Elasticsearch index.

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings, read from a JSON file.
///
/// ```json
/// { "host": "localhost", "port": 9200, "username": "elastic", "password": "changeme" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ElasticConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,

    /// `https` unless set.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Verify the server certificate. Off by default for self-signed clusters.
    #[serde(default)]
    pub verify_certs: bool,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_timeout() -> u64 {
    10000
}

impl ElasticConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Config file '{}' not found", path.display()))?;
        serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse the configuration file '{}'. Ensure it is valid JSON",
                path.display()
            )
        })
    }

    fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Reject names Elasticsearch would refuse or that would change the request path.
pub fn validate_index_name(index: &str) -> Result<()> {
    const FORBIDDEN: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':'];

    if index.is_empty() || index == "." || index == ".." {
        bail!("invalid index name '{}'", index);
    }
    if index.starts_with(['-', '_', '+']) {
        bail!("index name '{}' must not start with '-', '_' or '+'", index);
    }
    if index.chars().any(|c| c.is_uppercase() || FORBIDDEN.contains(&c)) {
        bail!("index name '{}' must be lowercase without special characters", index);
    }
    Ok(())
}

/// Minimal Elasticsearch REST client.
pub struct ElasticClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl ElasticClient {
    pub fn new(config: &ElasticConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(!config.verify_certs)
            .user_agent(concat!("ip-reputation-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%method, url = %url, "Elasticsearch request");
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Check that the cluster answers with the configured credentials.
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .request(reqwest::Method::GET, "")
            .send()
            .await
            .context("Unable to connect to Elasticsearch")?;

        if !response.status().is_success() {
            bail!("Unable to connect to Elasticsearch: HTTP {}", response.status());
        }
        Ok(())
    }

    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        validate_index_name(index)?;
        let response = self.request(reqwest::Method::HEAD, index).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => bail!("checking index '{}' failed: HTTP {}", index, status),
        }
    }

    pub async fn create_index(&self, index: &str) -> Result<()> {
        validate_index_name(index)?;
        let response = self.request(reqwest::Method::PUT, index).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Failed to create index '{}': HTTP {}: {}", index, status, body);
        }
        Ok(())
    }

    /// Create `index` if it is missing. Returns whether it was created.
    pub async fn ensure_index(&self, index: &str) -> Result<bool> {
        if self.index_exists(index).await? {
            info!(index, "Index already exists");
            return Ok(false);
        }
        self.create_index(index).await?;
        info!(index, "Index created");
        Ok(true)
    }

    /// Index `document` and return the id Elasticsearch assigned.
    pub async fn push(&self, index: &str, document: &Value) -> Result<String> {
        validate_index_name(index)?;
        let response = self
            .request(reqwest::Method::POST, &format!("{}/_doc", index))
            .json(document)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!(
                "Failed to push JSON data to index '{}': HTTP {}: {}",
                index,
                status,
                body
            );
        }

        let body: Value = response.json().await?;
        let id = body["_id"]
            .as_str()
            .context("index response has no _id")?
            .to_string();

        info!(index, id = %id, "Document pushed");
        Ok(id)
    }
}
