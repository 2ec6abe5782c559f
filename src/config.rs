//! TOML configuration for the collector.

use crate::collector::DEFAULT_CONCURRENCY;
use crate::poller::{ChartFailurePolicy, DEFAULT_AGENT_PORT, DEFAULT_TIMEOUT};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Agent addresses to poll, in report order
    pub hosts: Vec<String>,

    /// Seconds between collection runs
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Hosts polled at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub chart_failure: ChartFailurePolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            chart_failure: ChartFailurePolicy::default(),
        }
    }
}

/// Longest per-request timeout accepted from configuration
pub const MAX_TIMEOUT_SECS: f64 = 3600.0;

impl AgentConfig {
    /// Per-request timeout. Values `validate` would reject fall back to the
    /// default.
    pub fn timeout(&self) -> Duration {
        if !(self.timeout_secs > 0.0 && self.timeout_secs <= MAX_TIMEOUT_SECS) {
            return DEFAULT_TIMEOUT;
        }
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// Where batches are committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    Jsonl { path: PathBuf },
    Sqlite { url: String },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Jsonl {
            path: PathBuf::from("system_metrics.jsonl"),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_port() -> u16 {
    DEFAULT_AGENT_PORT
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl FleetConfig {
    /// Config with the given hosts and every other setting at its default
    pub fn with_hosts(hosts: Vec<String>) -> Self {
        Self {
            hosts,
            interval_secs: default_interval_secs(),
            agent: AgentConfig::default(),
            store: StoreConfig::default(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: FleetConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(index) = self.hosts.iter().position(|h| h.trim().is_empty()) {
            bail!("hosts[{index}] is blank");
        }
        let timeout = self.agent.timeout_secs;
        if !(timeout.is_finite() && timeout > 0.0 && timeout <= MAX_TIMEOUT_SECS) {
            bail!(
                "agent.timeout_secs must be greater than 0 and at most {MAX_TIMEOUT_SECS}, got {timeout}"
            );
        }
        if self.agent.concurrency == 0 {
            bail!("agent.concurrency must be at least 1");
        }
        if self.interval_secs == 0 {
            bail!("interval_secs must be at least 1");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
