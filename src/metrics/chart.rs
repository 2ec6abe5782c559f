//! Agent charts and their raw response payloads.

use super::{Mapping, CPU_MAPPING, DISK_MAPPING, MEMORY_MAPPING, NETWORK_MAPPING};
use serde::{Deserialize, Serialize};

/// One metric category exposed by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chart {
    Cpu,
    Memory,
    Disk,
    Network,
}

impl Chart {
    pub const ALL: [Chart; 4] = [Chart::Cpu, Chart::Memory, Chart::Disk, Chart::Network];

    /// Chart id understood by the agent's data API
    pub fn id(self) -> &'static str {
        match self {
            Chart::Cpu => "system.cpu",
            Chart::Memory => "system.ram",
            // root filesystem
            Chart::Disk => "disk_space._",
            // aggregate of all interfaces
            Chart::Network => "system.net",
        }
    }

    pub fn mapping(self) -> &'static [Mapping] {
        match self {
            Chart::Cpu => CPU_MAPPING,
            Chart::Memory => MEMORY_MAPPING,
            Chart::Disk => DISK_MAPPING,
            Chart::Network => NETWORK_MAPPING,
        }
    }
}

impl std::fmt::Display for Chart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Body of a `/api/v1/data` response.
///
/// Only `data` matters here; a missing `data` key is the same as no rows.
/// Individual values may be `null` when the agent has no sample for a
/// dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    #[serde(default)]
    pub data: Vec<Vec<Option<f64>>>,
}

impl ChartData {
    pub fn from_rows(rows: Vec<Vec<Option<f64>>>) -> Self {
        Self { data: rows }
    }

    /// Most recent sample (the query asks for a single point)
    pub fn first_row(&self) -> Option<&[Option<f64>]> {
        self.data.first().map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_key_means_no_rows() {
        let parsed: ChartData =
            serde_json::from_str(r#"{"labels":["time","user"],"api":1}"#).unwrap();
        assert!(parsed.is_empty());
        assert!(parsed.first_row().is_none());
    }

    #[test]
    fn null_dimensions_are_kept_as_gaps() {
        let parsed: ChartData =
            serde_json::from_str(r#"{"data":[[1700000000,1.5,null,3]]}"#).unwrap();
        assert_eq!(
            parsed.first_row().unwrap(),
            &[Some(1_700_000_000.0), Some(1.5), None, Some(3.0)]
        );
    }

    #[test]
    fn non_numeric_rows_are_rejected() {
        assert!(serde_json::from_str::<ChartData>(r#"{"data":"nope"}"#).is_err());
        assert!(serde_json::from_str::<ChartData>(r#"{"data":[["a",1]]}"#).is_err());
    }
}
