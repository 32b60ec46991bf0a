//! DNS blackhole list (RBL/DNSBL) provider.
//!
//! An IPv4 address `a.b.c.d` is listed on `list.example` when the name
//! `d.c.b.a.list.example` resolves to an A record. NXDOMAIN means the
//! address is not listed; any other resolver failure is reported for
//! that list alone and the scan moves on.

use super::{ProviderError, ReputationProvider};
use crate::config::RblConfig;
use crate::resolver::{DnsLookup, LookupOutcome};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::net::{AddrParseError, Ipv4Addr};
use tracing::{error, info, warn};

/// Blacklists queried when no list is configured.
///
/// `dnsbl.sorbs.net` and `bl.spamcop.net` appear twice; the checker
/// collapses repeats when it is built.
pub const DEFAULT_BLACKLISTS: [&str; 19] = [
    "zen.spamhaus.org",
    "bl.spamcop.net",
    "dnsbl.sorbs.net",
    "b.barracudacentral.org",
    "cbl.abuseat.org",
    "dnsbl-1.uceprotect.net",
    "dnsbl-2.uceprotect.net",
    "dnsbl-3.uceprotect.net",
    "psbl.surriel.com",
    "dnsbl.sorbs.net",
    "bl.spamcop.net",
    "list.dsbl.org",
    "sbl.spamhaus.org",
    "xbl.spamhaus.org",
    "pbl.spamhaus.org",
    "dnsbl.dronebl.org",
    "db.wpbl.info",
    "ubl.unsubscore.com",
    "rbl.interserver.net",
];

/// Listing status of an address on one blacklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RblStatus {
    Listed,
    NotListed,
    /// The lookup failed for a reason other than NXDOMAIN.
    Error(String),
}

impl RblStatus {
    pub fn is_listed(&self) -> bool {
        matches!(self, RblStatus::Listed)
    }
}

impl From<LookupOutcome> for RblStatus {
    fn from(outcome: LookupOutcome) -> Self {
        match outcome {
            LookupOutcome::Found(_) => RblStatus::Listed,
            LookupOutcome::NotFound => RblStatus::NotListed,
            LookupOutcome::Failed(msg) => RblStatus::Error(msg),
        }
    }
}

impl fmt::Display for RblStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RblStatus::Listed => write!(f, "Listed"),
            RblStatus::NotListed => write!(f, "Not Listed"),
            RblStatus::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl Serialize for RblStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of checking one address against every configured blacklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RblReport {
    /// Status per blacklist, in query order.
    Checked(Vec<(String, RblStatus)>),
    /// The address could not be turned into a query; nothing was looked up.
    Failed { error: String },
}

impl RblReport {
    /// Status recorded for `blacklist`, if it was checked.
    pub fn get(&self, blacklist: &str) -> Option<&RblStatus> {
        match self {
            RblReport::Checked(entries) => entries
                .iter()
                .find(|(name, _)| name == blacklist)
                .map(|(_, status)| status),
            RblReport::Failed { .. } => None,
        }
    }

    /// Keys of the serialized report, in output order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            RblReport::Checked(entries) => entries.iter().map(|(name, _)| name.as_str()).collect(),
            RblReport::Failed { .. } => vec!["error"],
        }
    }

    /// Top-level error, if the check could not run.
    pub fn error(&self) -> Option<&str> {
        match self {
            RblReport::Failed { error } => Some(error),
            RblReport::Checked(_) => None,
        }
    }

    /// Blacklists that list the address.
    pub fn listed_on(&self) -> Vec<&str> {
        match self {
            RblReport::Checked(entries) => entries
                .iter()
                .filter(|(_, status)| status.is_listed())
                .map(|(name, _)| name.as_str())
                .collect(),
            RblReport::Failed { .. } => Vec::new(),
        }
    }
}

impl Serialize for RblReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RblReport::Checked(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (name, status) in entries {
                    map.serialize_entry(name, status)?;
                }
                map.end()
            }
            RblReport::Failed { error } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Reverse the octets of a dotted-quad address: `1.2.3.4` becomes `4.3.2.1`.
///
/// The input must be exactly a dotted quad; surrounding whitespace is rejected.
pub fn reverse_octets(ip: &str) -> Result<String, AddrParseError> {
    let addr: Ipv4Addr = ip.parse()?;
    let [a, b, c, d] = addr.octets();
    Ok(format!("{}.{}.{}.{}", d, c, b, a))
}

/// Checks an address against a fixed set of DNS blackhole lists.
pub struct RblChecker {
    blacklists: Vec<String>,
    lookup: Box<dyn DnsLookup>,
    concurrency: usize,
    enabled: bool,
}

impl RblChecker {
    /// Create a checker over [`DEFAULT_BLACKLISTS`], querying one list at a time.
    pub fn new(lookup: Box<dyn DnsLookup>) -> Self {
        Self {
            blacklists: dedup(DEFAULT_BLACKLISTS),
            lookup,
            concurrency: 1,
            enabled: true,
        }
    }

    /// Create a checker from configuration.
    pub fn from_config(config: &RblConfig, lookup: Box<dyn DnsLookup>) -> Self {
        let mut checker = Self::new(lookup).with_concurrency(config.concurrency);
        if let Some(ref lists) = config.blacklists {
            checker = checker.with_blacklists(lists);
        }
        checker.enabled = config.enabled;
        checker
    }

    /// Replace the blacklist set. Repeated names are queried once.
    pub fn with_blacklists<I, S>(mut self, blacklists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blacklists = dedup(blacklists);
        self
    }

    /// Allow up to `concurrency` lookups in flight. Results keep list order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Blacklists this checker queries, in order.
    pub fn blacklists(&self) -> &[String] {
        &self.blacklists
    }

    /// Check `ip` against every blacklist.
    ///
    /// Never fails: per-list resolver errors are recorded as
    /// [`RblStatus::Error`], and an address that is not a dotted quad
    /// yields [`RblReport::Failed`] without any lookups.
    pub async fn check(&self, ip: &str) -> RblReport {
        let reversed = match reverse_octets(ip) {
            Ok(reversed) => reversed,
            Err(e) => {
                error!(ip, error = %e, "Error processing RBLs");
                return RblReport::Failed {
                    error: format!("invalid IPv4 address '{}': {}", ip, e),
                };
            }
        };

        let outcomes: Vec<(String, LookupOutcome)> = stream::iter(self.blacklists.iter().cloned())
            .map(|rbl| {
                let query = format!("{}.{}.", reversed, rbl);
                async move { (rbl, self.lookup.lookup_a(&query).await) }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut entries = Vec::with_capacity(outcomes.len());
        for (rbl, outcome) in outcomes {
            let status = RblStatus::from(outcome);
            match status {
                RblStatus::Listed => info!(ip, rbl = %rbl, "Listed"),
                RblStatus::NotListed => info!(ip, rbl = %rbl, "Not listed"),
                RblStatus::Error(ref msg) => {
                    warn!(ip, rbl = %rbl, error = %msg, "Error checking RBL")
                }
            }
            entries.push((rbl, status));
        }

        RblReport::Checked(entries)
    }
}

fn dedup<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|name| name.as_ref().trim().trim_end_matches('.').to_ascii_lowercase())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

#[async_trait]
impl ReputationProvider for RblChecker {
    async fn check(&self, target: &str) -> Result<Value, ProviderError> {
        let report = RblChecker::check(self, target).await;
        serde_json::to_value(&report).map_err(|e| ProviderError::Other(e.to_string()))
    }

    fn name(&self) -> &str {
        "rbl"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted resolver: answers from a table, NXDOMAIN for everything else.
    #[derive(Default)]
    struct ScriptedLookup {
        answers: HashMap<String, LookupOutcome>,
        queries: Arc<AtomicUsize>,
    }

    impl ScriptedLookup {
        fn answer(mut self, name: &str, outcome: LookupOutcome) -> Self {
            self.answers.insert(name.to_string(), outcome);
            self
        }
    }

    #[async_trait]
    impl DnsLookup for ScriptedLookup {
        async fn lookup_a(&self, name: &str) -> LookupOutcome {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.answers
                .get(name)
                .cloned()
                .unwrap_or(LookupOutcome::NotFound)
        }
    }

    fn listed() -> LookupOutcome {
        LookupOutcome::Found(vec![Ipv4Addr::new(127, 0, 0, 2)])
    }

    #[test]
    fn test_reverse_octets() {
        assert_eq!(reverse_octets("1.2.3.4").unwrap(), "4.3.2.1");
        assert_eq!(reverse_octets("192.168.0.10").unwrap(), "10.0.168.192");
    }

    #[test]
    fn test_reverse_octets_twice_restores_address() {
        for ip in ["1.2.3.4", "10.20.30.40", "255.0.0.1"] {
            let once = reverse_octets(ip).unwrap();
            assert_eq!(reverse_octets(&once).unwrap(), ip);
        }
    }

    #[test]
    fn test_reverse_octets_rejects_malformed() {
        assert!(reverse_octets("not-an-ip").is_err());
        assert!(reverse_octets("1.2.3").is_err());
        assert!(reverse_octets("1.2.3.256").is_err());
        assert!(reverse_octets("::1").is_err());
        assert!(reverse_octets(" 1.2.3.4").is_err());
        assert!(reverse_octets("1.2.3.4\n").is_err());
    }

    #[test]
    fn test_default_list_collapses_duplicates() {
        let checker = RblChecker::new(Box::new(ScriptedLookup::default()));
        assert_eq!(DEFAULT_BLACKLISTS.len(), 19);
        assert_eq!(checker.blacklists().len(), 17);
        assert_eq!(checker.blacklists()[0], "zen.spamhaus.org");
        assert_eq!(checker.blacklists()[16], "rbl.interserver.net");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(RblStatus::Listed.to_string(), "Listed");
        assert_eq!(RblStatus::NotListed.to_string(), "Not Listed");
        assert_eq!(
            RblStatus::Error("timed out".to_string()).to_string(),
            "Error: timed out"
        );
    }

    #[tokio::test]
    async fn test_listed() {
        let lookup = ScriptedLookup::default().answer("4.3.2.1.zen.spamhaus.org.", listed());
        let checker = RblChecker::new(Box::new(lookup));

        let report = checker.check("1.2.3.4").await;
        assert_eq!(report.get("zen.spamhaus.org"), Some(&RblStatus::Listed));
        assert_eq!(report.listed_on(), vec!["zen.spamhaus.org"]);
    }

    #[tokio::test]
    async fn test_not_listed() {
        let checker = RblChecker::new(Box::new(ScriptedLookup::default()));

        let report = checker.check("1.2.3.4").await;
        assert_eq!(report.get("bl.spamcop.net"), Some(&RblStatus::NotListed));
        assert!(report.listed_on().is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_scan() {
        let lookup = ScriptedLookup::default()
            .answer(
                "4.3.2.1.cbl.abuseat.org.",
                LookupOutcome::Failed("request timed out".to_string()),
            )
            .answer("4.3.2.1.psbl.surriel.com.", listed());
        let checker = RblChecker::new(Box::new(lookup));

        let report = checker.check("1.2.3.4").await;
        assert_eq!(report.keys().len(), 17);
        for rbl in checker.blacklists() {
            assert!(report.get(rbl).is_some(), "missing {}", rbl);
        }

        let failed = report.get("cbl.abuseat.org").unwrap().to_string();
        assert!(failed.starts_with("Error:"));
        assert_eq!(report.get("psbl.surriel.com"), Some(&RblStatus::Listed));
        assert_eq!(report.get("sbl.spamhaus.org"), Some(&RblStatus::NotListed));
    }

    #[tokio::test]
    async fn test_malformed_ip_yields_only_error() {
        let lookup = ScriptedLookup::default();
        let queries = lookup.queries.clone();
        let checker = RblChecker::new(Box::new(lookup));

        let report = checker.check("not-an-ip").await;
        assert!(report.error().is_some());
        assert_eq!(report.keys(), vec!["error"]);
        assert_eq!(queries.load(Ordering::SeqCst), 0);

        let json = serde_json::to_value(&report).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(object["error"].as_str().unwrap().contains("not-an-ip"));
    }

    #[tokio::test]
    async fn test_padded_ip_is_rejected_verbatim() {
        let lookup = ScriptedLookup::default();
        let queries = lookup.queries.clone();
        let checker = RblChecker::new(Box::new(lookup));

        let report = checker.check(" 1.2.3.4 ").await;
        assert_eq!(report.keys(), vec!["error"]);
        assert!(report.error().unwrap().contains("' 1.2.3.4 '"));
        assert_eq!(queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keys_are_subset_of_blacklists() {
        let checker = RblChecker::new(Box::new(ScriptedLookup::default()));
        let report = checker.check("8.8.8.8").await;

        for key in report.keys() {
            assert!(DEFAULT_BLACKLISTS.contains(&key));
        }
    }

    #[tokio::test]
    async fn test_duplicates_queried_once() {
        let lookup = ScriptedLookup::default();
        let queries = lookup.queries.clone();
        let checker = RblChecker::new(Box::new(lookup));

        checker.check("1.2.3.4").await;
        assert_eq!(queries.load(Ordering::SeqCst), 17);
    }

    #[tokio::test]
    async fn test_repeated_checks_are_identical() {
        let lookup = ScriptedLookup::default()
            .answer("4.3.2.1.zen.spamhaus.org.", listed())
            .answer(
                "4.3.2.1.db.wpbl.info.",
                LookupOutcome::Failed("SERVFAIL".to_string()),
            );
        let checker = RblChecker::new(Box::new(lookup));

        let first = checker.check("1.2.3.4").await;
        let second = checker.check("1.2.3.4").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrency_keeps_order_and_content() {
        let script = || {
            ScriptedLookup::default()
                .answer("4.3.2.1.xbl.spamhaus.org.", listed())
                .answer(
                    "4.3.2.1.list.dsbl.org.",
                    LookupOutcome::Failed("no connections available".to_string()),
                )
        };

        let sequential = RblChecker::new(Box::new(script())).check("1.2.3.4").await;
        let fanned_out = RblChecker::new(Box::new(script()))
            .with_concurrency(8)
            .check("1.2.3.4")
            .await;

        assert_eq!(sequential, fanned_out);
    }

    #[tokio::test]
    async fn test_check_runs_on_spawned_task() {
        let lookup = ScriptedLookup::default().answer("4.3.2.1.pbl.spamhaus.org.", listed());
        let checker: Arc<dyn ReputationProvider> =
            Arc::new(RblChecker::new(Box::new(lookup)).with_concurrency(4));

        let task = tokio::spawn({
            let checker = Arc::clone(&checker);
            async move { checker.check("1.2.3.4").await }
        });

        let value = task.await.unwrap().unwrap();
        assert_eq!(value.as_object().unwrap().len(), 17);
        assert_eq!(value["pbl.spamhaus.org"], "Listed");
    }

    #[tokio::test]
    async fn test_serialized_report_order_and_values() {
        let lookup = ScriptedLookup::default().answer("4.3.2.1.b.example.", listed());
        let checker = RblChecker::new(Box::new(lookup))
            .with_blacklists(["a.example", "b.example", "a.example."]);

        let report = checker.check("1.2.3.4").await;
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"a.example":"Not Listed","b.example":"Listed"}"#);
    }

    #[tokio::test]
    async fn test_provider_trait_returns_json() {
        let lookup = ScriptedLookup::default().answer("4.3.2.1.zen.spamhaus.org.", listed());
        let checker = RblChecker::new(Box::new(lookup));
        let provider: &dyn ReputationProvider = &checker;

        assert_eq!(provider.name(), "rbl");
        assert!(provider.is_enabled());

        let value = provider.check("1.2.3.4").await.unwrap();
        assert_eq!(value["zen.spamhaus.org"], "Listed");
        assert_eq!(value["rbl.interserver.net"], "Not Listed");
    }

    #[test]
    fn test_from_config() {
        let config = RblConfig {
            enabled: false,
            blacklists: Some(vec!["zen.spamhaus.org".to_string()]),
            concurrency: 0,
            timeout_ms: None,
            nameserver: None,
        };
        let checker = RblChecker::from_config(&config, Box::new(ScriptedLookup::default()));

        assert_eq!(checker.blacklists(), ["zen.spamhaus.org".to_string()]);
        assert!(!ReputationProvider::is_enabled(&checker));
        assert_eq!(checker.concurrency, 1);
    }
}
