use async_trait::async_trait;
use ip_reputation_cli::config::IpInfoConfig;
use ip_reputation_cli::providers::ipinfo::IpInfoProvider;
use ip_reputation_cli::resolver::{DnsLookup, LookupOutcome};
use ip_reputation_cli::{output, RblChecker, ReputationLookup};
use serde_json::json;
use std::net::Ipv4Addr;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Lists 1.2.3.4 on Spamhaus ZEN, times out on SORBS, NXDOMAIN elsewhere.
struct FixedLookup;

#[async_trait]
impl DnsLookup for FixedLookup {
    async fn lookup_a(&self, name: &str) -> LookupOutcome {
        match name {
            "4.3.2.1.zen.spamhaus.org." => LookupOutcome::Found(vec![Ipv4Addr::new(127, 0, 0, 4)]),
            "4.3.2.1.dnsbl.sorbs.net." => LookupOutcome::Failed("request timed out".to_string()),
            _ => LookupOutcome::NotFound,
        }
    }
}

#[tokio::test]
async fn test_check_all_combines_rbl_and_http_providers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.2.3.4/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ip": "1.2.3.4", "country": "AU" })))
        .mount(&server)
        .await;

    let ipinfo = IpInfoProvider::new(IpInfoConfig {
        base_url: server.uri(),
        ..IpInfoConfig::default()
    })
    .unwrap();

    let lookup = ReputationLookup::with_providers(vec![
        Box::new(RblChecker::new(Box::new(FixedLookup))),
        Box::new(ipinfo),
    ]);

    let reports = lookup.check_all("1.2.3.4").await;

    let rbl = reports["rbl"].as_object().unwrap();
    assert_eq!(rbl.len(), 17);
    assert_eq!(rbl["zen.spamhaus.org"], "Listed");
    assert_eq!(rbl["dnsbl.sorbs.net"], "Error: request timed out");
    assert_eq!(rbl["bl.spamcop.net"], "Not Listed");

    assert_eq!(reports["ipinfo"]["country"], "AU");
}

#[tokio::test]
async fn test_malformed_address_reported_by_every_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ipinfo = IpInfoProvider::new(IpInfoConfig {
        base_url: server.uri(),
        ..IpInfoConfig::default()
    })
    .unwrap();

    let lookup = ReputationLookup::with_providers(vec![
        Box::new(RblChecker::new(Box::new(FixedLookup))),
        Box::new(ipinfo),
    ]);

    let reports = lookup.check_all("not-an-ip").await;

    let rbl = reports["rbl"].as_object().unwrap();
    assert_eq!(rbl.len(), 1);
    assert!(rbl.contains_key("error"));
    assert_eq!(
        reports["ipinfo"],
        json!({ "error": "Failed to retrieve geolocation for not-an-ip" })
    );
}

#[tokio::test]
async fn test_rbl_report_renders_in_list_order() {
    let checker = RblChecker::new(Box::new(FixedLookup));
    let report = checker.check("1.2.3.4").await;

    let rendered = output::render(&report).unwrap();
    let first = rendered.find("zen.spamhaus.org").unwrap();
    let last = rendered.find("rbl.interserver.net").unwrap();
    assert!(first < last);
    assert!(rendered.starts_with("{\n    \"zen.spamhaus.org\": \"Listed\","));
}
