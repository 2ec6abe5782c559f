//! Per-host agent queries.
//!
//! A poll issues one `points=1` data query per chart against the host's
//! agent and hands back either the four raw payloads or the captured
//! failure text. Nothing here retries.

use crate::metrics::{Chart, ChartData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Port the monitoring agent listens on
pub const DEFAULT_AGENT_PORT: u16 = 19999;

/// Per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// What to do when one of a host's chart queries fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartFailurePolicy {
    /// Any failing chart marks the whole host unreachable
    #[default]
    AbortHost,
    /// Keep the charts that answered; unreachable only if none did
    SkipChart,
}

/// Failure of a single chart query
#[derive(Debug, Error)]
pub enum PollError {
    #[error("empty host address")]
    EmptyHost,

    #[error("{chart} query timed out after {timeout:?}")]
    Timeout { chart: Chart, timeout: Duration },

    #[error("{chart} query failed")]
    Transport {
        chart: Chart,
        #[source]
        source: reqwest::Error,
    },

    #[error("{chart} query returned HTTP {status}")]
    Status {
        chart: Chart,
        status: reqwest::StatusCode,
    },

    #[error("{chart} response is malformed")]
    Malformed {
        chart: Chart,
        #[source]
        source: serde_json::Error,
    },
}

impl PollError {
    /// Message plus its source chain, as stored in `error_message`
    pub fn describe(&self) -> String {
        let mut text = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            text.push_str(": ");
            text.push_str(&err.to_string());
            source = err.source();
        }
        text
    }
}

/// Raw chart payloads of one host. `None` means the chart was not fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHostPayload {
    pub cpu: Option<ChartData>,
    pub memory: Option<ChartData>,
    pub disk: Option<ChartData>,
    pub network: Option<ChartData>,
}

impl RawHostPayload {
    pub fn chart(&self, chart: Chart) -> Option<&ChartData> {
        match chart {
            Chart::Cpu => self.cpu.as_ref(),
            Chart::Memory => self.memory.as_ref(),
            Chart::Disk => self.disk.as_ref(),
            Chart::Network => self.network.as_ref(),
        }
    }
}

/// Outcome of polling one host
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Reachable { payload: RawHostPayload },
    Unreachable { reason: String },
}

/// Anything that can produce a poll outcome for a host address
#[async_trait]
pub trait HostSource: Send + Sync {
    async fn fetch(&self, host_ip: &str) -> PollOutcome;
}

/// HTTP poller for the agent's data API
#[derive(Debug, Clone)]
pub struct HostPoller {
    client: reqwest::Client,
    port: u16,
    timeout: Duration,
    policy: ChartFailurePolicy,
}

impl HostPoller {
    pub fn new(port: u16, timeout: Duration, policy: ChartFailurePolicy) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            port,
            timeout,
            policy,
        })
    }

    pub fn with_defaults() -> reqwest::Result<Self> {
        Self::new(DEFAULT_AGENT_PORT, DEFAULT_TIMEOUT, ChartFailurePolicy::default())
    }

    pub fn policy(&self) -> ChartFailurePolicy {
        self.policy
    }

    /// Base data endpoint of a host's agent.
    ///
    /// A host given as a socket address (`10.0.0.5:20000`, `[fe80::1]:20000`)
    /// keeps its own port; anything else gets the configured agent port.
    pub fn endpoint(&self, host_ip: &str) -> String {
        if let Ok(addr) = host_ip.parse::<SocketAddr>() {
            format!("http://{addr}/api/v1/data")
        } else if let Ok(ip) = host_ip.parse::<Ipv6Addr>() {
            format!("http://[{}]:{}/api/v1/data", ip, self.port)
        } else {
            format!("http://{}:{}/api/v1/data", host_ip, self.port)
        }
    }

    async fn fetch_chart(&self, host_ip: &str, chart: Chart) -> Result<ChartData, PollError> {
        let response = self
            .client
            .get(self.endpoint(host_ip))
            .query(&[("chart", chart.id()), ("points", "1")])
            .send()
            .await
            .map_err(|e| self.request_error(chart, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status { chart, status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error(chart, e))?;
        let data: ChartData =
            serde_json::from_slice(&body).map_err(|source| PollError::Malformed { chart, source })?;

        debug!(host = host_ip, chart = chart.id(), rows = data.data.len(), "chart fetched");
        Ok(data)
    }

    fn request_error(&self, chart: Chart, err: reqwest::Error) -> PollError {
        if err.is_timeout() {
            PollError::Timeout {
                chart,
                timeout: self.timeout,
            }
        } else {
            PollError::Transport { chart, source: err }
        }
    }

    async fn fetch_all_or_nothing(&self, host_ip: &str) -> Result<RawHostPayload, PollError> {
        let (cpu, memory, disk, network) = futures::try_join!(
            self.fetch_chart(host_ip, Chart::Cpu),
            self.fetch_chart(host_ip, Chart::Memory),
            self.fetch_chart(host_ip, Chart::Disk),
            self.fetch_chart(host_ip, Chart::Network),
        )?;
        Ok(RawHostPayload {
            cpu: Some(cpu),
            memory: Some(memory),
            disk: Some(disk),
            network: Some(network),
        })
    }

    async fn fetch_each(&self, host_ip: &str) -> PollOutcome {
        let (cpu, memory, disk, network) = futures::join!(
            self.fetch_chart(host_ip, Chart::Cpu),
            self.fetch_chart(host_ip, Chart::Memory),
            self.fetch_chart(host_ip, Chart::Disk),
            self.fetch_chart(host_ip, Chart::Network),
        );

        let mut failures = Vec::new();
        let mut keep = |result: Result<ChartData, PollError>| match result {
            Ok(data) => Some(data),
            Err(e) => {
                let reason = e.describe();
                warn!(host = host_ip, error = %reason, "chart skipped");
                failures.push(reason);
                None
            }
        };
        let payload = RawHostPayload {
            cpu: keep(cpu),
            memory: keep(memory),
            disk: keep(disk),
            network: keep(network),
        };

        if failures.len() == Chart::ALL.len() {
            PollOutcome::Unreachable {
                reason: failures.join("; "),
            }
        } else {
            PollOutcome::Reachable { payload }
        }
    }
}

#[async_trait]
impl HostSource for HostPoller {
    async fn fetch(&self, host_ip: &str) -> PollOutcome {
        if host_ip.trim().is_empty() {
            return PollOutcome::Unreachable {
                reason: PollError::EmptyHost.to_string(),
            };
        }

        match self.policy {
            ChartFailurePolicy::AbortHost => match self.fetch_all_or_nothing(host_ip).await {
                Ok(payload) => PollOutcome::Reachable { payload },
                Err(e) => {
                    let reason = e.describe();
                    warn!(host = host_ip, error = %reason, "host unreachable");
                    PollOutcome::Unreachable { reason }
                }
            },
            ChartFailurePolicy::SkipChart => self.fetch_each(host_ip).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uses_agent_port() {
        let poller = HostPoller::with_defaults().unwrap();
        assert_eq!(poller.endpoint("10.0.0.9"), "http://10.0.0.9:19999/api/v1/data");
        assert_eq!(poller.endpoint("fe80::1"), "http://[fe80::1]:19999/api/v1/data");
        assert_eq!(poller.endpoint("node-7.lan"), "http://node-7.lan:19999/api/v1/data");
        assert_eq!(
            poller.endpoint("127.0.0.1:20000"),
            "http://127.0.0.1:20000/api/v1/data"
        );
        assert_eq!(
            poller.endpoint("[::1]:20000"),
            "http://[::1]:20000/api/v1/data"
        );
    }

    #[test]
    fn timeout_text_mentions_timing_out() {
        let err = PollError::Timeout {
            chart: Chart::Cpu,
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.describe(), "system.cpu query timed out after 5s");
    }

    #[test]
    fn malformed_text_includes_parser_detail() {
        let source = serde_json::from_str::<ChartData>("not json").unwrap_err();
        let err = PollError::Malformed {
            chart: Chart::Disk,
            source,
        };
        let text = err.describe();
        assert!(text.starts_with("disk_space._ response is malformed: "), "{text}");
    }

    #[tokio::test]
    async fn blank_host_is_unreachable_without_io() {
        let poller = HostPoller::with_defaults().unwrap();
        let outcome = poller.fetch("  ").await;
        assert_eq!(
            outcome,
            PollOutcome::Unreachable {
                reason: "empty host address".to_string()
            }
        );
    }
}
