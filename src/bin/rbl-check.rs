//! Check an IP address against DNS blackhole lists and print the result as JSON.

use anyhow::Result;
use clap::Parser;
use ip_reputation_cli::resolver::HickoryLookup;
use ip_reputation_cli::{logging, output, RblChecker};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "rbl-check")]
#[command(about = "Check IP reputation against RBL (Real-time Blackhole List)")]
#[command(version)]
struct Args {
    /// IP address to check
    ip: String,

    /// Maximum DNS queries in flight
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Per-query DNS timeout in milliseconds (resolver default when unset)
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Query this name server (ip:port) instead of the system resolvers
    #[arg(long, value_name = "ADDR")]
    nameserver: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init(&args.log_level, args.log_file.as_deref())?;

    let lookup = HickoryLookup::new(args.nameserver, args.timeout_ms.map(Duration::from_millis))?;
    let checker = RblChecker::new(Box::new(lookup)).with_concurrency(args.concurrency);

    let report = checker.check(&args.ip).await;
    output::emit(&report, None)?;

    Ok(())
}
