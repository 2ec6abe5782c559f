//! The normalized per-host observation and its persisted shape.

use crate::metrics::Field;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Width of the `error_message` column
pub const ERROR_MESSAGE_MAX_CHARS: usize = 256;

/// Optional numeric fields of one observation.
///
/// Every field is independent: a populated CPU group says nothing about
/// memory, disk or network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricFields {
    /// Percent of CPU time in user space
    pub cpu_user: Option<f64>,
    /// Percent of CPU time in the kernel
    pub cpu_system: Option<f64>,
    pub cpu_idle: Option<f64>,
    pub cpu_iowait: Option<f64>,

    /// Memory quantities as reported by the agent
    pub memory_total: Option<f64>,
    pub memory_used: Option<f64>,
    pub memory_cached: Option<f64>,
    pub memory_free: Option<f64>,

    /// Root filesystem quantities
    pub disk_total: Option<f64>,
    pub disk_used: Option<f64>,
    pub disk_free: Option<f64>,

    /// Aggregate interface throughput
    pub network_received_bytes: Option<f64>,
    pub network_sent_bytes: Option<f64>,
}

impl MetricFields {
    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::CpuUser => self.cpu_user,
            Field::CpuSystem => self.cpu_system,
            Field::CpuIdle => self.cpu_idle,
            Field::CpuIowait => self.cpu_iowait,
            Field::MemoryTotal => self.memory_total,
            Field::MemoryUsed => self.memory_used,
            Field::MemoryCached => self.memory_cached,
            Field::MemoryFree => self.memory_free,
            Field::DiskTotal => self.disk_total,
            Field::DiskUsed => self.disk_used,
            Field::DiskFree => self.disk_free,
            Field::NetworkReceivedBytes => self.network_received_bytes,
            Field::NetworkSentBytes => self.network_sent_bytes,
        }
    }

    pub fn set(&mut self, field: Field, value: Option<f64>) {
        let slot = match field {
            Field::CpuUser => &mut self.cpu_user,
            Field::CpuSystem => &mut self.cpu_system,
            Field::CpuIdle => &mut self.cpu_idle,
            Field::CpuIowait => &mut self.cpu_iowait,
            Field::MemoryTotal => &mut self.memory_total,
            Field::MemoryUsed => &mut self.memory_used,
            Field::MemoryCached => &mut self.memory_cached,
            Field::MemoryFree => &mut self.memory_free,
            Field::DiskTotal => &mut self.disk_total,
            Field::DiskUsed => &mut self.disk_used,
            Field::DiskFree => &mut self.disk_free,
            Field::NetworkReceivedBytes => &mut self.network_received_bytes,
            Field::NetworkSentBytes => &mut self.network_sent_bytes,
        };
        *slot = value;
    }

    /// Number of fields carrying a value
    pub fn populated(&self) -> usize {
        Field::ALL.iter().filter(|f| self.get(**f).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.populated() == 0
    }
}

/// One observation of one host during one collection run.
///
/// Created once by the collector and persisted once; never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMetricRecord {
    pub host_ip: String,
    pub timestamp: DateTime<Utc>,
    pub is_reachable: bool,
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub metrics: MetricFields,
}

impl HostMetricRecord {
    pub fn reachable(host_ip: impl Into<String>, timestamp: DateTime<Utc>, metrics: MetricFields) -> Self {
        Self {
            host_ip: host_ip.into(),
            timestamp,
            is_reachable: true,
            error_message: None,
            metrics,
        }
    }

    /// A failed observation: no metrics, only the captured reason
    pub fn unreachable(host_ip: impl Into<String>, timestamp: DateTime<Utc>, reason: &str) -> Self {
        Self {
            host_ip: host_ip.into(),
            timestamp,
            is_reachable: false,
            error_message: Some(truncate_message(reason, ERROR_MESSAGE_MAX_CHARS)),
            metrics: MetricFields::default(),
        }
    }
}

/// Cut `message` to at most `max_chars` characters
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => message[..byte_idx].to_string(),
        None => message.to_string(),
    }
}
