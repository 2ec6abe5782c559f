//! SQLite-backed store for the `system_metrics` table.

use super::{MetricStore, StoreError};
use crate::metrics::Field;
use crate::record::{HostMetricRecord, MetricFields};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

pub const TABLE: &str = "system_metrics";

/// Inserts each batch inside a single transaction
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    insert_sql: String,
    select_sql: String,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and make sure the
    /// table exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // One long-lived connection keeps `sqlite::memory:` databases alive
        // and serialises batch writers.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool);
        store.ensure_schema().await?;
        info!(url, "sqlite store ready");
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            insert_sql: insert_statement(),
            select_sql: select_statement(),
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(&create_statement()).execute(&self.pool).await?;
        Ok(())
    }

    /// Every persisted row, in insertion order
    pub async fn load(&self) -> Result<Vec<HostMetricRecord>, StoreError> {
        let rows = sqlx::query(&self.select_sql).fetch_all(&self.pool).await?;
        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(records)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {TABLE}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MetricStore for SqliteStore {
    async fn commit(&self, batch: &[HostMetricRecord]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        // Dropping `tx` on an early return rolls the whole batch back.
        let mut tx = self.pool.begin().await?;
        for record in batch {
            let mut query = sqlx::query(&self.insert_sql)
                .bind(record.host_ip.as_str())
                .bind(record.timestamp)
                .bind(record.is_reachable)
                .bind(record.error_message.as_deref());
            for field in Field::ALL {
                query = query.bind(record.metrics.get(field));
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(records = batch.len(), "batch committed");
        Ok(())
    }
}

fn create_statement() -> String {
    let metric_columns: Vec<String> = Field::ALL
        .iter()
        .map(|f| format!("    {} REAL", f.column()))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (\n    \
         id INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
         host_ip TEXT NOT NULL CHECK (length(host_ip) > 0),\n    \
         timestamp TEXT NOT NULL,\n\
         {},\n    \
         is_reachable INTEGER NOT NULL DEFAULT 1,\n    \
         error_message TEXT\n)",
        metric_columns.join(",\n")
    )
}

fn insert_statement() -> String {
    let mut columns = vec!["host_ip", "timestamp", "is_reachable", "error_message"];
    columns.extend(Field::ALL.iter().map(|f| f.column()));
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {TABLE} ({}) VALUES ({placeholders})",
        columns.join(", ")
    )
}

fn select_statement() -> String {
    let mut columns = vec!["host_ip", "timestamp", "is_reachable", "error_message"];
    columns.extend(Field::ALL.iter().map(|f| f.column()));
    format!("SELECT {} FROM {TABLE} ORDER BY id", columns.join(", "))
}

fn record_from_row(row: &SqliteRow) -> Result<HostMetricRecord, sqlx::Error> {
    let mut metrics = MetricFields::default();
    for field in Field::ALL {
        metrics.set(field, row.try_get::<Option<f64>, _>(field.column())?);
    }
    Ok(HostMetricRecord {
        host_ip: row.try_get("host_ip")?,
        timestamp: row.try_get("timestamp")?,
        is_reachable: row.try_get("is_reachable")?,
        error_message: row.try_get("error_message")?,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn full_record(host: &str) -> HostMetricRecord {
        let mut metrics = MetricFields::default();
        for (i, field) in Field::ALL.iter().enumerate() {
            metrics.set(*field, Some(i as f64 + 0.5));
        }
        HostMetricRecord::reachable(host, Utc::now(), metrics)
    }

    #[test]
    fn insert_binds_every_column() {
        let sql = insert_statement();
        assert_eq!(sql.matches('?').count(), 17);
        assert!(sql.contains("network_sent_bytes"));
    }

    #[tokio::test]
    async fn rows_round_trip_with_nulls() {
        let store = memory_store().await;
        let down = HostMetricRecord::unreachable("10.0.0.9", Utc::now(), "timed out");
        store.commit(&[full_record("10.0.0.1"), down.clone()]).await.unwrap();

        let rows = store.load().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].metrics.populated(), 13);
        assert_eq!(rows[1].host_ip, "10.0.0.9");
        assert!(!rows[1].is_reachable);
        assert_eq!(rows[1].error_message.as_deref(), Some("timed out"));
        assert!(rows[1].metrics.is_empty());
    }

    #[tokio::test]
    async fn failing_row_rolls_back_whole_batch() {
        let store = memory_store().await;
        store.commit(&[full_record("10.0.0.1")]).await.unwrap();

        // the empty host_ip violates the CHECK constraint on the third insert
        let batch = vec![full_record("10.0.0.2"), full_record("10.0.0.3"), full_record("")];
        let err = store.commit(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));

        let hosts: Vec<_> = store.load().await.unwrap().into_iter().map(|r| r.host_ip).collect();
        assert_eq!(hosts, vec!["10.0.0.1"]);
    }

    #[tokio::test]
    async fn closed_pool_reports_failure() {
        let store = memory_store().await;
        store.close().await;
        assert!(store.commit(&[full_record("10.0.0.1")]).await.is_err());
    }
}
