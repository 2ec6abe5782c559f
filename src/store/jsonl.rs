//! JSON Lines file store: one record per line, appended per batch.

use super::{MetricStore, StoreError};
use crate::record::HostMetricRecord;
use async_trait::async_trait;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Appends batches to a JSON Lines file.
///
/// A batch is encoded in full before the file is touched, written with a
/// single write and synced. If the write fails the file is cut back to its
/// previous length. A line without a trailing newline is a torn write and is
/// never treated as a committed record.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every committed record back, oldest first
    pub fn load(&self) -> Result<Vec<HostMetricRecord>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in contents.split_inclusive('\n') {
            if !line.ends_with('\n') {
                // Torn tail from an interrupted write
                continue;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl MetricStore for JsonLinesStore {
    async fn commit(&self, batch: &[HostMetricRecord]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let bytes = encode_batch(batch)?;
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_batch(&path, &bytes))
            .await
            .map_err(|e| StoreError::Unavailable(format!("writer task failed: {e}")))??;

        debug!(path = %self.path.display(), records = batch.len(), "batch appended");
        Ok(())
    }
}

fn encode_batch(batch: &[HostMetricRecord]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::with_capacity(batch.len() * 512);
    for record in batch {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

fn append_batch(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    let start = trim_torn_tail(&mut file)?;
    if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_data()) {
        if let Err(rollback) = file.set_len(start) {
            warn!(path = %path.display(), error = %rollback, "failed to roll back partial batch");
        }
        return Err(e);
    }
    Ok(())
}

/// Drop an unterminated final line; returns the resulting file length
fn trim_torn_tail(file: &mut File) -> io::Result<u64> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(len);
    }

    let mut contents = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut contents)?;
    let keep = contents
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i as u64 + 1);
    file.set_len(keep)?;
    warn!(dropped_bytes = len - keep, "discarded torn tail of metrics file");
    Ok(keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MetricFields;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample(host: &str) -> HostMetricRecord {
        let metrics = MetricFields {
            cpu_user: Some(10.0),
            ..Default::default()
        };
        HostMetricRecord::reachable(host, Utc::now(), metrics)
    }

    #[tokio::test]
    async fn batches_append_in_order() {
        let dir = tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path().join("metrics.jsonl"));

        store.commit(&[sample("10.0.0.1"), sample("10.0.0.2")]).await.unwrap();
        store.commit(&[sample("10.0.0.1")]).await.unwrap();

        let hosts: Vec<_> = store.load().unwrap().into_iter().map(|r| r.host_ip).collect();
        assert_eq!(hosts, vec!["10.0.0.1", "10.0.0.2", "10.0.0.1"]);
    }

    #[tokio::test]
    async fn empty_batch_does_not_create_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        let store = JsonLinesStore::new(&path);

        store.commit(&[]).await.unwrap();
        assert!(!path.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn torn_tail_is_ignored_and_repaired() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        let store = JsonLinesStore::new(&path);
        store.commit(&[sample("10.0.0.1")]).await.unwrap();

        // simulate a crash halfway through a line
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"host_ip":"10.0.0."#).unwrap();
        drop(file);
        assert_eq!(store.load().unwrap().len(), 1);

        store.commit(&[sample("10.0.0.2")]).await.unwrap();
        let hosts: Vec<_> = store.load().unwrap().into_iter().map(|r| r.host_ip).collect();
        assert_eq!(hosts, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[tokio::test]
    async fn unwritable_path_reports_error() {
        let dir = tempdir().unwrap();
        // a directory cannot be opened for appending
        let store = JsonLinesStore::new(dir.path());
        let err = store.commit(&[sample("10.0.0.1")]).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
