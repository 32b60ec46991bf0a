//! IP reputation lookups for threat-intelligence workflows.
//!
//! Checks an address against DNS blackhole lists and, optionally, a
//! handful of HTTP reputation services.
//!
//! # Features
//!
//! - **RBL Checks** - Query 17 public DNS blackhole lists, per-list status
//! - **AbuseIPDB** - Abuse confidence reports
//! - **AlienVault OTX** - IPv4/IPv6 indicator reputation
//! - **IPQualityScore** - Fraud and proxy scoring
//! - **IPInfo** - Geolocation
//! - **Subfinder** - Passive subdomain enumeration via the `subfinder` binary
//! - **XML to JSON** - Convert scanner XML reports
//! - **Elasticsearch** - Push JSON reports into an index
//!
//! A failed lookup never aborts the others: an RBL whose resolver errors
//! is reported as `"Error: ..."`, and an HTTP provider that fails is
//! reported as `{"error": "..."}`.
//!
//! # Example Configuration
//!
//! ```yaml
//! rbl:
//!   concurrency: 4
//!
//! abuseipdb:
//!   api_key: "${ABUSEIPDB_API_KEY}"
//!
//! ipinfo:
//!   enabled: false
//! ```

pub mod config;
pub mod elastic;
pub mod logging;
pub mod lookup;
pub mod output;
pub mod providers;
pub mod resolver;
pub mod subfinder;
pub mod xml2json;

pub use config::{ApiKeys, Config};
pub use lookup::{ProviderKind, ReputationLookup};
pub use providers::rbl::{RblChecker, RblReport, RblStatus, DEFAULT_BLACKLISTS};
