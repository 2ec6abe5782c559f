//! Named numeric fields of the persisted record schema.

use serde::{Deserialize, Serialize};

/// A numeric column of `system_metrics`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CpuUser,
    CpuSystem,
    CpuIdle,
    CpuIowait,
    MemoryTotal,
    MemoryUsed,
    MemoryCached,
    MemoryFree,
    DiskTotal,
    DiskUsed,
    DiskFree,
    NetworkReceivedBytes,
    NetworkSentBytes,
}

impl Field {
    /// Schema order, as consumers of the persisted table expect it.
    pub const ALL: [Field; 13] = [
        Field::CpuUser,
        Field::CpuSystem,
        Field::CpuIdle,
        Field::CpuIowait,
        Field::MemoryTotal,
        Field::MemoryUsed,
        Field::MemoryCached,
        Field::MemoryFree,
        Field::DiskTotal,
        Field::DiskUsed,
        Field::DiskFree,
        Field::NetworkReceivedBytes,
        Field::NetworkSentBytes,
    ];

    /// Column name in the persisted schema
    pub fn column(self) -> &'static str {
        match self {
            Field::CpuUser => "cpu_user",
            Field::CpuSystem => "cpu_system",
            Field::CpuIdle => "cpu_idle",
            Field::CpuIowait => "cpu_iowait",
            Field::MemoryTotal => "memory_total",
            Field::MemoryUsed => "memory_used",
            Field::MemoryCached => "memory_cached",
            Field::MemoryFree => "memory_free",
            Field::DiskTotal => "disk_total",
            Field::DiskUsed => "disk_used",
            Field::DiskFree => "disk_free",
            Field::NetworkReceivedBytes => "network_received_bytes",
            Field::NetworkSentBytes => "network_sent_bytes",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}
