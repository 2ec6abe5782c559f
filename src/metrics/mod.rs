//! Chart catalogue and the positional dimension mapping for each chart.
//!
//! The agent answers every chart query with rows shaped like
//! `[timestamp, dim1, dim2, ...]`. Which dimension lands where is fixed by
//! the agent's own dimension ordering, so extraction here is positional and
//! not a named lookup. If the agent ever reorders its dimensions the fields
//! are silently mislabelled; nothing on this side can detect that.

pub mod chart;
pub mod field;

pub use chart::{Chart, ChartData};
pub use field::Field;

/// One positional mapping entry: the row index a field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub index: usize,
    pub field: Field,
}

const fn map(index: usize, field: Field) -> Mapping {
    Mapping { index, field }
}

/// `system.cpu`: user, idle, system, iowait.
pub const CPU_MAPPING: &[Mapping] = &[
    map(1, Field::CpuUser),
    map(2, Field::CpuIdle),
    map(3, Field::CpuSystem),
    map(4, Field::CpuIowait),
];

/// `system.ram`: total, free, used, cached.
pub const MEMORY_MAPPING: &[Mapping] = &[
    map(1, Field::MemoryTotal),
    map(2, Field::MemoryFree),
    map(3, Field::MemoryUsed),
    map(4, Field::MemoryCached),
];

/// `disk_space._`: total, used, free.
pub const DISK_MAPPING: &[Mapping] = &[
    map(1, Field::DiskTotal),
    map(2, Field::DiskUsed),
    map(3, Field::DiskFree),
];

/// `system.net`: received, sent.
pub const NETWORK_MAPPING: &[Mapping] = &[
    map(1, Field::NetworkReceivedBytes),
    map(2, Field::NetworkSentBytes),
];
