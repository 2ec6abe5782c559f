//! Fleet telemetry collector.
//!
//! Queries the monitoring agent on each configured host for CPU, memory,
//! disk and network samples, normalizes the fixed-position chart rows into
//! one record per host, and commits each run's batch to a store in one go.

pub mod collector;
pub mod config;
pub mod display;
pub mod metrics;
pub mod normalizer;
pub mod poller;
pub mod record;
pub mod store;

pub use collector::{CollectError, FleetCollector, RunReport};
pub use config::{FleetConfig, StoreConfig};
pub use normalizer::normalize;
pub use poller::{ChartFailurePolicy, HostPoller, HostSource, PollError, PollOutcome, RawHostPayload};
pub use record::{HostMetricRecord, MetricFields};
pub use store::{JsonLinesStore, MemoryStore, MetricStore, SqliteStore, StoreError};
