//! Fleet-wide collection runs.

use crate::normalizer::normalize;
use crate::poller::{HostSource, PollOutcome};
use crate::record::HostMetricRecord;
use crate::store::{MetricStore, StoreError};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Hosts polled at the same time when nothing else is configured
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Run-level failures. Per-host problems never surface here; they are
/// recorded in the host's record instead.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("host entry {index} is blank")]
    InvalidHost { index: usize },

    #[error("failed to commit batch of {records} records")]
    Store {
        records: usize,
        #[source]
        source: StoreError,
    },
}

/// Result of one committed collection run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// One record per input host, in input order
    pub records: Vec<HostMetricRecord>,
}

impl RunReport {
    pub fn reachable(&self) -> usize {
        self.records.iter().filter(|r| r.is_reachable).count()
    }

    pub fn unreachable(&self) -> usize {
        self.records.len() - self.reachable()
    }
}

/// Polls every host, normalizes what came back and commits the batch once.
pub struct FleetCollector<P, S> {
    source: P,
    store: S,
    concurrency: usize,
}

impl<P: HostSource, S: MetricStore> FleetCollector<P, S> {
    pub fn new(source: P, store: S) -> Self {
        Self {
            source,
            store,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Cap on hosts in flight; values below one are treated as one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one collection over `hosts`.
    ///
    /// Every host yields exactly one record whatever happens to it. The batch
    /// is committed once, after the last host finishes. Dropping the returned
    /// future before that point commits nothing.
    pub async fn collect(&self, hosts: &[String]) -> Result<RunReport, CollectError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let records = self.poll_hosts(hosts).await?;
        self.commit_run(started_at, start, records).await
    }

    /// Like [`collect`](Self::collect), but gives up when `cancel` resolves
    /// while hosts are still being polled. Returns `Ok(None)` in that case
    /// and nothing is committed. Once polling has finished the commit runs
    /// to completion and `cancel` is no longer observed.
    pub async fn collect_until<C>(
        &self,
        hosts: &[String],
        cancel: C,
    ) -> Result<Option<RunReport>, CollectError>
    where
        C: Future<Output = ()>,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let records = tokio::select! {
            records = self.poll_hosts(hosts) => records?,
            () = cancel => {
                debug!(hosts = hosts.len(), "run cancelled while polling");
                return Ok(None);
            }
        };
        self.commit_run(started_at, start, records).await.map(Some)
    }

    async fn poll_hosts(&self, hosts: &[String]) -> Result<Vec<HostMetricRecord>, CollectError> {
        if let Some(index) = hosts.iter().position(|h| h.trim().is_empty()) {
            return Err(CollectError::InvalidHost { index });
        }

        // Completion order, so a slow host never holds back a free slot.
        let mut finished: Vec<(usize, HostMetricRecord)> = stream::iter(hosts.iter().enumerate())
            .map(|(index, host)| async move { (index, self.collect_host(host).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        finished.sort_unstable_by_key(|(index, _)| *index);
        Ok(finished.into_iter().map(|(_, record)| record).collect())
    }

    async fn commit_run(
        &self,
        started_at: DateTime<Utc>,
        start: Instant,
        records: Vec<HostMetricRecord>,
    ) -> Result<RunReport, CollectError> {
        self.store
            .commit(&records)
            .await
            .map_err(|source| CollectError::Store {
                records: records.len(),
                source,
            })?;

        let report = RunReport {
            started_at,
            elapsed: start.elapsed(),
            records,
        };
        info!(
            hosts = report.records.len(),
            reachable = report.reachable(),
            unreachable = report.unreachable(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "collection run committed"
        );
        Ok(report)
    }

    async fn collect_host(&self, host_ip: &str) -> HostMetricRecord {
        let outcome = self.source.fetch(host_ip).await;
        let timestamp = Utc::now();
        match outcome {
            PollOutcome::Reachable { payload } => {
                let metrics = normalize(&payload);
                debug!(host = host_ip, fields = metrics.populated(), "host collected");
                HostMetricRecord::reachable(host_ip, timestamp, metrics)
            }
            PollOutcome::Unreachable { reason } => {
                warn!(host = host_ip, error = %reason, "recording host as unreachable");
                HostMetricRecord::unreachable(host_ip, timestamp, &reason)
            }
        }
    }
}
