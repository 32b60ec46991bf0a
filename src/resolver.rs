//! DNS A-record lookups used by the RBL checker.

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{ResolveError, TokioResolver};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::debug;

/// Outcome of a single A-record lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The name resolved to one or more addresses.
    Found(Vec<Ipv4Addr>),
    /// The name does not exist (NXDOMAIN).
    NotFound,
    /// Any other failure: timeout, SERVFAIL, empty answer, network error.
    Failed(String),
}

impl From<ResolveError> for LookupOutcome {
    fn from(e: ResolveError) -> Self {
        if e.is_nx_domain() {
            LookupOutcome::NotFound
        } else {
            LookupOutcome::Failed(e.to_string())
        }
    }
}

/// Resolves A records for a fully-qualified name.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    async fn lookup_a(&self, name: &str) -> LookupOutcome;
}

/// `DnsLookup` backed by hickory.
pub struct HickoryLookup {
    resolver: TokioResolver,
}

impl HickoryLookup {
    /// Build a resolver from the system configuration.
    ///
    /// `timeout` overrides the per-query timeout; `None` keeps the resolver default.
    pub fn system(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = TokioResolver::builder_tokio()
            .map_err(|e| anyhow::anyhow!("failed to read system resolver config: {e}"))?;

        if let Some(timeout) = timeout {
            builder.options_mut().timeout = timeout;
        }

        Ok(Self {
            resolver: builder.build(),
        })
    }

    /// Build a resolver that sends every query to one name server over UDP.
    pub fn with_name_server(addr: SocketAddr, timeout: Option<Duration>) -> Self {
        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));

        let mut builder =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default());
        if let Some(timeout) = timeout {
            builder.options_mut().timeout = timeout;
        }

        Self {
            resolver: builder.build(),
        }
    }

    /// System resolver, or a single name server when one is given.
    pub fn new(name_server: Option<SocketAddr>, timeout: Option<Duration>) -> anyhow::Result<Self> {
        match name_server {
            Some(addr) => Ok(Self::with_name_server(addr, timeout)),
            None => Self::system(timeout),
        }
    }
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn lookup_a(&self, name: &str) -> LookupOutcome {
        match self.resolver.ipv4_lookup(name).await {
            Ok(lookup) => {
                let addrs: Vec<Ipv4Addr> = lookup.iter().map(|a| a.0).collect();
                debug!(name, answers = addrs.len(), "A lookup answered");
                LookupOutcome::Found(addrs)
            }
            Err(e) => LookupOutcome::from(e),
        }
    }
}
