//! Plain-text rendering of a collection run.

use crate::collector::RunReport;
use crate::record::HostMetricRecord;
use std::fmt::Write;

/// Format bytes to human readable string
pub fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    if bytes >= TB {
        format!("{:.2} TB", bytes / TB)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes / KB)
    } else {
        format!("{:.0} B", bytes)
    }
}

/// Format bytes per second
pub fn format_throughput(bytes_per_sec: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    // the agent reports outbound traffic as a negative rate
    let rate = bytes_per_sec.abs();
    if rate >= GB {
        format!("{:.2} GB/s", rate / GB)
    } else if rate >= MB {
        format!("{:.2} MB/s", rate / MB)
    } else if rate >= KB {
        format!("{:.2} KB/s", rate / KB)
    } else {
        format!("{:.0} B/s", rate)
    }
}

/// Truncate a string to max length, adding ".." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 2 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 2).collect();
        format!("{}..", head)
    }
}

fn or_na(value: Option<f64>, fmt: impl Fn(f64) -> String) -> String {
    value.map(fmt).unwrap_or_else(|| "N/A".to_string())
}

fn host_line(record: &HostMetricRecord) -> String {
    let host = truncate_str(&record.host_ip, 18);
    if !record.is_reachable {
        let reason = record.error_message.as_deref().unwrap_or("unknown error");
        return format!("{:<18} DOWN  {}", host, truncate_str(reason, 90));
    }

    let m = &record.metrics;
    let busy = m.cpu_idle.map(|idle| 100.0 - idle);
    format!(
        "{:<18} UP    CPU {:>6} (usr {:>5} sys {:>5} iow {:>5})  Mem {:>10}/{:<10}  Disk {:>10}/{:<10}  Net RX {:>10} TX {:>10}",
        host,
        or_na(busy, |v| format!("{:.1}%", v)),
        or_na(m.cpu_user, |v| format!("{:.1}", v)),
        or_na(m.cpu_system, |v| format!("{:.1}", v)),
        or_na(m.cpu_iowait, |v| format!("{:.1}", v)),
        or_na(m.memory_used, format_bytes),
        or_na(m.memory_total, format_bytes),
        or_na(m.disk_used, format_bytes),
        or_na(m.disk_total, format_bytes),
        or_na(m.network_received_bytes, format_throughput),
        or_na(m.network_sent_bytes, format_throughput),
    )
}

/// Render one committed run as a block of text
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "--- Run {} --- {} hosts, {} up, {} down ({:.1}s)",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.records.len(),
        report.reachable(),
        report.unreachable(),
        report.elapsed.as_secs_f64(),
    );
    for record in &report.records {
        let _ = writeln!(out, "{}", host_line(record));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MetricFields;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(1536.0), "1.50 KB");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0 * 1024.0), "3.00 GB");
        assert_eq!(format_throughput(-2048.0), "2.00 KB/s");
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_str("abcdef", 4), "ab..");
        assert_eq!(truncate_str("ééééé", 3), "é..");
        assert_eq!(truncate_str("abc", 10), "abc");
    }

    #[test]
    fn report_lists_every_host() {
        let metrics = MetricFields {
            cpu_user: Some(10.0),
            cpu_idle: Some(70.0),
            ..Default::default()
        };
        let report = RunReport {
            started_at: Utc::now(),
            elapsed: Duration::from_millis(1200),
            records: vec![
                HostMetricRecord::reachable("10.0.0.1", Utc::now(), metrics),
                HostMetricRecord::unreachable("10.0.0.9", Utc::now(), "system.cpu query timed out after 5s"),
            ],
        };

        let text = render_report(&report);
        assert!(text.contains("2 hosts, 1 up, 1 down"));
        assert!(text.contains("10.0.0.1           UP    CPU  30.0%"));
        assert!(text.contains("Mem        N/A/"));
        assert!(text.contains("10.0.0.9           DOWN  system.cpu query timed out after 5s"));
    }
}
