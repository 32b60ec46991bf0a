//! Passive subdomain enumeration through an external `subfinder` binary.
//!
//! `subfinder -oJ` prints one JSON object per discovered host on stdout and
//! status lines on stderr. The objects are collected into a [`SubfinderScan`].

use anyhow::{bail, Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// One enumeration run against a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubfinderScan {
    /// Local time the scan finished, ISO 8601 without offset.
    pub scan_date: String,
    pub target_domain: String,
    /// Host records as printed by subfinder.
    pub subdomains: Vec<Value>,
    pub total_subdomains: usize,
}

impl SubfinderScan {
    /// Build a scan from subfinder's stdout.
    pub fn from_output(domain: &str, stdout: &str) -> Self {
        let subdomains = parse_json_lines(stdout);
        Self {
            scan_date: Local::now()
                .naive_local()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
            target_domain: domain.to_string(),
            total_subdomains: subdomains.len(),
            subdomains,
        }
    }
}

/// Collect the JSON objects from line-delimited output.
///
/// Lines that do not start with `{` are skipped; lines that do but fail to
/// parse are logged and skipped.
pub fn parse_json_lines(output: &str) -> Vec<Value> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(line, error = %e, "Failed to parse JSON line");
                None
            }
        })
        .collect()
}

/// Runs the subfinder binary.
#[derive(Debug, Clone)]
pub struct Subfinder {
    binary: PathBuf,
    recursive: bool,
    timeout: Option<Duration>,
}

impl Subfinder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            recursive: false,
            timeout: None,
        }
    }

    /// Also use sources that support recursive enumeration.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Kill the scan if it has not finished within `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn args<'a>(&self, domain: &'a str) -> Vec<&'a str> {
        let mut args = vec!["-d", domain, "-oJ", "-all", "-cs"];
        if self.recursive {
            args.push("-recursive");
        }
        args
    }

    /// Enumerate subdomains of `domain`.
    pub async fn scan(&self, domain: &str) -> Result<SubfinderScan> {
        if domain.is_empty() || domain.starts_with('-') {
            bail!("invalid domain '{}'", domain);
        }

        let args = self.args(domain);
        debug!(binary = %self.binary.display(), ?args, "Executing subfinder");

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child)
                .await
                .map_err(|_| anyhow::anyhow!("subfinder timed out after {:?}", timeout))?,
            None => child.await,
        }
        .with_context(|| format!("failed to execute {}", self.binary.display()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            // subfinder reports progress on stderr
            if stderr.contains("[INF]") {
                info!(domain, "{}", stderr);
            } else {
                error!(domain, "subfinder stderr: {}", stderr);
            }
        }

        if !output.status.success() {
            bail!("subfinder exited with {}", output.status);
        }

        let scan = SubfinderScan::from_output(domain, &String::from_utf8_lossy(&output.stdout));
        info!(domain, total = scan.total_subdomains, "Found subdomains");
        Ok(scan)
    }
}

/// File a scan of `domain` is saved to inside `dir`.
pub fn results_path(dir: &Path, domain: &str) -> PathBuf {
    dir.join(format!("subfinder_results_{}.json", domain))
}

/// Save `scan` under `dir`, returning the file written.
///
/// With `append`, an existing results file is turned into an array (if it
/// is not one already) and the scan is added to the end. An existing file
/// that is not valid JSON is replaced.
pub fn save_results(scan: &SubfinderScan, dir: &Path, append: bool) -> Result<PathBuf> {
    let path = results_path(dir, &scan.target_domain);
    let current = serde_json::to_value(scan)?;

    let document = match append.then(|| std::fs::read_to_string(&path)) {
        Some(Ok(existing)) => match serde_json::from_str::<Value>(&existing) {
            Ok(Value::Array(mut runs)) => {
                runs.push(current);
                Value::Array(runs)
            }
            Ok(previous) => Value::Array(vec![previous, current]),
            Err(_) => {
                warn!(path = %path.display(), "Existing file is not valid JSON, creating new file");
                current
            }
        },
        _ => current,
    };

    crate::output::write_file(&document, &path)?;
    Ok(path)
}
