//! IP reputation CLI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ip_reputation_cli::elastic::{ElasticClient, ElasticConfig};
use ip_reputation_cli::subfinder::{self, Subfinder};
use ip_reputation_cli::{logging, output, xml2json, ApiKeys, Config, ProviderKind, ReputationLookup};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ip-reputation")]
#[command(about = "Check IP reputation against DNS blackhole lists and threat-intelligence services")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info", global = true)]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    /// Also save the JSON result to this file
    #[arg(short, long, value_name = "PATH", global = true)]
    output: Option<PathBuf>,

    /// AbuseIPDB API key; enables AbuseIPDB for `all`
    #[arg(long, env = "ABUSEIPDB_API_KEY", hide_env_values = true, global = true)]
    abuseipdb_key: Option<String>,

    /// AlienVault OTX API key; enables OTX for `all`
    #[arg(long, env = "OTX_API_KEY", hide_env_values = true, global = true)]
    otx_key: Option<String>,

    /// IPQualityScore API key; enables IPQS for `all`
    #[arg(long, env = "IPQS_API_KEY", hide_env_values = true, global = true)]
    ipqs_key: Option<String>,

    /// IPInfo access token
    #[arg(long, env = "IPINFO_TOKEN", hide_env_values = true, global = true)]
    ipinfo_token: Option<String>,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Args {
    fn api_keys(&self) -> ApiKeys {
        ApiKeys {
            abuseipdb: self.abuseipdb_key.clone(),
            otx: self.otx_key.clone(),
            ipqs: self.ipqs_key.clone(),
            ipinfo_token: self.ipinfo_token.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check an IPv4 address against DNS blackhole lists
    Rbl {
        /// IP address to check
        ip: String,

        /// Maximum DNS queries in flight
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Query AbuseIPDB
    Abuseipdb {
        /// IP address to check
        ip: String,

        /// AbuseIPDB API key (overrides --abuseipdb-key)
        api_key: Option<String>,
    },
    /// Query AlienVault OTX
    Otx {
        /// IP address to check
        ip: String,

        /// AlienVault OTX API key (overrides --otx-key)
        api_key: Option<String>,
    },
    /// Query IPQualityScore
    Ipqs {
        /// IP address to check
        ip: String,

        /// IPQualityScore API key (overrides --ipqs-key)
        api_key: Option<String>,
    },
    /// Look up geolocation data with IPInfo
    Ipinfo {
        /// IP address to check
        ip: String,
    },
    /// Run every enabled lookup
    All {
        /// IP address to check
        ip: String,
    },
    /// Convert an XML file to JSON
    Xml2json {
        /// Path to the XML file
        xml_path: PathBuf,
    },
    /// Enumerate subdomains with subfinder
    Subfinder {
        /// Target domain to scan
        #[arg(short, long)]
        domain: String,

        /// Path to the subfinder executable
        #[arg(long, env = "SUBFINDER_PATH", default_value = "subfinder")]
        subfinder_path: PathBuf,

        /// Save results as subfinder_results_<domain>.json in this directory
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Append to an existing results file instead of replacing it
        #[arg(long, requires = "output_dir")]
        append: bool,

        /// Use recursive enumeration sources
        #[arg(long)]
        recursive: bool,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },
    /// Create an Elasticsearch index if needed and push a JSON document to it
    EsPush {
        /// Index name
        #[arg(long)]
        index: String,

        /// JSON file with host, port, username and password
        #[arg(long, value_name = "PATH")]
        es_config: PathBuf,

        /// JSON document to push
        #[arg(long, conflicts_with = "json_file")]
        json_text: Option<String>,

        /// Read the JSON document to push from this file
        #[arg(long, value_name = "PATH")]
        json_file: Option<PathBuf>,
    },
}

impl Command {
    /// Address to look up, for the reputation commands.
    fn ip(&self) -> Option<&str> {
        match self {
            Command::Rbl { ip, .. }
            | Command::Abuseipdb { ip, .. }
            | Command::Otx { ip, .. }
            | Command::Ipqs { ip, .. }
            | Command::Ipinfo { ip }
            | Command::All { ip } => Some(ip.as_str()),
            _ => None,
        }
    }

    fn kind(&self) -> Option<ProviderKind> {
        match self {
            Command::Rbl { .. } => Some(ProviderKind::Rbl),
            Command::Abuseipdb { .. } => Some(ProviderKind::AbuseIpdb),
            Command::Otx { .. } => Some(ProviderKind::Otx),
            Command::Ipqs { .. } => Some(ProviderKind::Ipqs),
            Command::Ipinfo { .. } => Some(ProviderKind::IpInfo),
            _ => None,
        }
    }

    /// Fold command-line settings into the loaded configuration.
    ///
    /// Global keys (flags or environment) apply first; a key given to a
    /// provider subcommand wins over them.
    fn apply_overrides(&self, keys: &ApiKeys, config: &mut Config) {
        keys.apply_to(config);

        match self {
            Command::Rbl { concurrency, .. } => {
                config.rbl.enabled = true;
                if let Some(n) = concurrency {
                    config.rbl.concurrency = *n;
                }
            }
            Command::Abuseipdb { api_key, .. } => {
                ApiKeys {
                    abuseipdb: api_key.clone(),
                    ..ApiKeys::default()
                }
                .apply_to(config);
                if let Some(ref mut c) = config.abuseipdb {
                    c.enabled = true;
                }
            }
            Command::Otx { api_key, .. } => {
                ApiKeys {
                    otx: api_key.clone(),
                    ..ApiKeys::default()
                }
                .apply_to(config);
                if let Some(ref mut c) = config.otx {
                    c.enabled = true;
                }
            }
            Command::Ipqs { api_key, .. } => {
                ApiKeys {
                    ipqs: api_key.clone(),
                    ..ApiKeys::default()
                }
                .apply_to(config);
                if let Some(ref mut c) = config.ipqs {
                    c.enabled = true;
                }
            }
            Command::Ipinfo { .. } => config.ipinfo.enabled = true,
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    logging::init(&args.log_level, args.log_file.as_deref())?;

    let mut config = match args.config {
        Some(ref path) => {
            info!(config = %path.display(), "Loading configuration");
            Config::load(path)?
        }
        None => Config::default(),
    };

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let keys = args.api_keys();
    let Some(command) = args.command else {
        anyhow::bail!("no command given; run with --help for usage");
    };
    let save_to = args.output.as_deref();

    match command {
        Command::Xml2json { ref xml_path } => run_xml2json(xml_path, save_to),
        Command::Subfinder {
            ref domain,
            ref subfinder_path,
            ref output_dir,
            append,
            recursive,
            timeout_secs,
        } => {
            let runner = Subfinder::new(subfinder_path)
                .with_recursive(recursive)
                .with_timeout(timeout_secs.map(Duration::from_secs));

            info!(domain = %domain, "Starting subfinder scan");
            let scan = runner.scan(domain).await?;
            if let Some(dir) = output_dir {
                subfinder::save_results(&scan, dir, append)?;
            }
            output::emit(&scan, save_to)
        }
        Command::EsPush {
            ref index,
            ref es_config,
            ref json_text,
            ref json_file,
        } => run_es_push(index, es_config, json_text.as_deref(), json_file.as_deref()).await,
        _ => {
            command.apply_overrides(&keys, &mut config);
            config.validate()?;
            run_lookup(&command, &config, save_to).await
        }
    }
}

async fn run_lookup(command: &Command, config: &Config, save_to: Option<&Path>) -> Result<()> {
    let Some(ip) = command.ip() else {
        anyhow::bail!("not a lookup command");
    };

    match command.kind() {
        Some(kind) => {
            let lookup = ReputationLookup::single(config, kind)?;
            if let Some(report) = lookup.check_one(kind.name(), ip).await {
                output::emit(&report, save_to)?;
            }
        }
        None => {
            let lookup = ReputationLookup::from_config(config)?;
            info!(providers = ?lookup.provider_names(), "Running all lookups");
            let reports = lookup.check_all(ip).await;
            output::emit(&reports, save_to)?;
        }
    }

    Ok(())
}

fn run_xml2json(xml_path: &Path, save_to: Option<&Path>) -> Result<()> {
    let value = xml2json::convert_file(xml_path)?;

    match save_to {
        Some(path) => {
            output::write_file(&value, path)?;
            println!("JSON data has been written to {}", path.display());
        }
        None => println!("{}", output::render(&value)?),
    }

    Ok(())
}

async fn run_es_push(
    index: &str,
    es_config: &Path,
    json_text: Option<&str>,
    json_file: Option<&Path>,
) -> Result<()> {
    let document: Option<Value> = match (json_text, json_file) {
        (Some(text), _) => Some(serde_json::from_str(text).context("Invalid JSON text provided")?),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Some(serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))?)
        }
        (None, None) => None,
    };

    let config = ElasticConfig::load(es_config)?;
    let client = ElasticClient::new(&config)?;
    client.ping().await?;

    if client.ensure_index(index).await? {
        println!("Index '{}' created.", index);
    } else {
        println!("Index '{}' already exists.", index);
    }

    match document {
        Some(document) => {
            let id = client.push(index, &document).await?;
            println!("Document pushed to index '{}'. Document ID: {}", index, id);
        }
        None => println!("No JSON text provided. Skipping data push."),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ip_reputation_cli::config::AbuseIPDBConfig;

    fn overridden(argv: &[&str], mut config: Config) -> Config {
        let args = Args::try_parse_from(argv).unwrap();
        let keys = args.api_keys();
        args.command.unwrap().apply_overrides(&keys, &mut config);
        config
    }

    fn without_rbl() -> Config {
        let mut config = Config::default();
        config.rbl.enabled = false;
        config
    }

    #[test]
    fn test_all_picks_up_global_keys() {
        let config = overridden(
            &[
                "ip-reputation",
                "--abuseipdb-key",
                "abuse-key",
                "--otx-key",
                "otx-key",
                "all",
                "1.2.3.4",
            ],
            without_rbl(),
        );

        assert_eq!(config.abuseipdb.as_ref().unwrap().api_key, "abuse-key");
        assert_eq!(config.otx.as_ref().unwrap().api_key, "otx-key");
        assert!(config.validate().is_ok());

        let lookup = ReputationLookup::from_config(&config).unwrap();
        let names = lookup.provider_names();
        assert!(names.contains(&"abuseipdb"));
        assert!(names.contains(&"otx"));
    }

    #[test]
    fn test_global_keys_accepted_after_subcommand() {
        let config = overridden(
            &["ip-reputation", "all", "1.2.3.4", "--ipqs-key", "ipqs-key"],
            Config::default(),
        );
        assert_eq!(config.ipqs.unwrap().api_key, "ipqs-key");
    }

    #[test]
    fn test_subcommand_key_wins_over_global_key() {
        let config = overridden(
            &[
                "ip-reputation",
                "--abuseipdb-key",
                "global",
                "abuseipdb",
                "1.2.3.4",
                "positional",
            ],
            Config::default(),
        );
        assert_eq!(config.abuseipdb.unwrap().api_key, "positional");
    }

    #[test]
    fn test_provider_subcommand_enables_configured_section() {
        let file = Config {
            abuseipdb: Some(AbuseIPDBConfig {
                enabled: false,
                ..AbuseIPDBConfig::with_key("from-file")
            }),
            ..Config::default()
        };

        let config = overridden(&["ip-reputation", "abuseipdb", "1.2.3.4"], file);
        let abuseipdb = config.abuseipdb.unwrap();
        assert!(abuseipdb.enabled);
        assert!(!abuseipdb.api_key.is_empty());
    }

    #[test]
    fn test_rbl_concurrency_override() {
        let config = overridden(
            &["ip-reputation", "rbl", "1.2.3.4", "--concurrency", "6"],
            Config::default(),
        );
        assert!(config.rbl.enabled);
        assert_eq!(config.rbl.concurrency, 6);
    }

    #[test]
    fn test_non_lookup_commands_have_no_ip() {
        let args = Args::try_parse_from(["ip-reputation", "xml2json", "scan.xml"]).unwrap();
        let command = args.command.unwrap();
        assert!(command.ip().is_none());
        assert!(command.kind().is_none());

        let args = Args::try_parse_from(["ip-reputation", "subfinder", "-d", "example.com"]).unwrap();
        assert!(args.command.unwrap().ip().is_none());
    }

    #[test]
    fn test_es_push_text_and_file_conflict() {
        let result = Args::try_parse_from([
            "ip-reputation",
            "es-push",
            "--index",
            "scans",
            "--es-config",
            "es.json",
            "--json-text",
            "{}",
            "--json-file",
            "doc.json",
        ]);
        assert!(result.is_err());
    }
}
