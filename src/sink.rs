use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::SinkConfig;
use crate::decode::ChunkReader;
use crate::enrich::enrich;
use crate::errors::{ConnectionError, Result, SinkError};
use crate::route::{group_by_tag, resolve_table, route_groups};
use crate::storage::StorageClient;
use crate::telemetry::SinkMetrics;

/// Outcome of one flush. Dropped batches are the ones absorbed after a
/// resolution or submission failure; the flush itself still succeeds.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FlushSummary {
    pub events: usize,
    pub batches_written: usize,
    pub batches_dropped: usize,
    pub records_written: usize,
    pub records_dropped: usize,
}

/// Buffered event-delivery sink. The surrounding buffering layer invokes
/// `write` once per flush and serializes those invocations, so the shared
/// connection needs no locking here. The connection is held in an `Option`
/// and only ever lent to the resolver and submitter, leaving room for a
/// reconnect strategy to swap it later.
pub struct TableSink<C: StorageClient> {
    config: SinkConfig,
    client: C,
    conn: Option<C::Conn>,
    metrics: SinkMetrics,
}

impl<C: StorageClient> TableSink<C> {
    pub fn new(config: SinkConfig, client: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            conn: None,
            metrics: SinkMetrics::default(),
        })
    }

    /// Opens the storage connection. Call once before the first flush.
    pub async fn start(&mut self) -> Result<()> {
        let conn = self
            .client
            .connect(&self.config.host, self.config.port, &self.config.database)
            .await
            .map_err(|err| ConnectionError::Open {
                host: self.config.host.clone(),
                port: self.config.port,
                reason: err.to_string(),
            })?;

        info!(
            "Connected to {}:{} database {}",
            self.config.host, self.config.port, self.config.database
        );
        self.conn = Some(conn);
        Ok(())
    }

    /// Closes the storage connection. Idempotent; a no-op if never started.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            self.client
                .close(conn)
                .await
                .map_err(|err| ConnectionError::Close {
                    reason: err.to_string(),
                })?;
            info!("Closed storage connection");
        }
        Ok(())
    }

    /// Delivers one buffered chunk: decode, enrich, group by tag, then one
    /// bulk insert per destination batch.
    ///
    /// Decode failures fail the whole flush. Resolution and submission
    /// failures are absorbed per batch: logged with the destination key,
    /// counted in the summary, and kept from touching sibling batches.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<FlushSummary> {
        let conn = self.conn.as_ref().ok_or(SinkError::NotConnected)?;

        let events = ChunkReader::new(chunk)?
            .map(|event| event.map(|e| enrich(e, &self.config)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut summary = FlushSummary {
            events: events.len(),
            ..Default::default()
        };

        let groups = group_by_tag(events);
        let batches = route_groups(groups, self.config.auto_tag_table, &self.config.table);

        for (destination, records) in batches {
            let count = records.len();

            let table = match resolve_table(
                &self.client,
                conn,
                &destination,
                self.config.auto_tag_table,
            )
            .await
            {
                Ok(table) => table,
                Err(err) => {
                    error!("Dropping {} record(s) for {}: {}", count, destination, err);
                    summary.batches_dropped += 1;
                    summary.records_dropped += count;
                    continue;
                }
            };

            match self.client.insert_many(conn, &table, records).await {
                Ok(written) => {
                    debug!("Wrote {} record(s) to table {}", written, table);
                    summary.batches_written += 1;
                    summary.records_written += written;
                }
                Err(err) => {
                    error!(
                        "Insert into table {} failed, dropping {} record(s): {}",
                        table, count, err
                    );
                    summary.batches_dropped += 1;
                    summary.records_dropped += count;
                }
            }
        }

        self.metrics.observe(&summary);
        Ok(summary)
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ChunkBuilder;
    use crate::storage::{MemoryStorage, Record};
    use serde_json::Value;

    fn chunk(events: &[(&str, Option<i64>, &str)]) -> Vec<u8> {
        let mut builder = ChunkBuilder::new();
        for (tag, timestamp, msg) in events {
            let mut fields = Record::new();
            fields.insert("msg".to_string(), Value::from(*msg));
            builder.push(tag, *timestamp, &fields).unwrap();
        }
        builder.into_bytes()
    }

    async fn started_sink(config: SinkConfig) -> (TableSink<MemoryStorage>, MemoryStorage) {
        let storage = MemoryStorage::new();
        let mut sink = TableSink::new(config, storage.clone()).unwrap();
        sink.start().await.unwrap();
        (sink, storage)
    }

    #[tokio::test]
    async fn test_write_before_start_errors() {
        let mut sink = TableSink::new(SinkConfig::new("metrics"), MemoryStorage::new()).unwrap();

        let err = sink.write(b"").await.unwrap_err();
        assert!(matches!(err, SinkError::NotConnected));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let mut config = SinkConfig::new("metrics");
        config.database = String::new();

        assert!(TableSink::new(config, MemoryStorage::new()).is_err());
    }

    #[tokio::test]
    async fn test_lifecycle_start_write_shutdown() {
        let mut config = SinkConfig::new("metrics");
        config.auto_tag_table = true;
        let (mut sink, storage) = started_sink(config).await;
        assert!(sink.is_connected());

        let summary = sink
            .write(&chunk(&[("app", Some(100), "a")]))
            .await
            .unwrap();
        assert_eq!(summary.records_written, 1);
        assert_eq!(storage.rows("metrics", "app").unwrap().len(), 1);

        sink.shutdown().await.unwrap();
        assert!(!sink.is_connected());
        // second shutdown is a no-op
        sink.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_chunk_touches_nothing() {
        let mut config = SinkConfig::new("metrics");
        config.auto_tag_table = true;
        let (mut sink, storage) = started_sink(config).await;

        let summary = sink.write(b"").await.unwrap();

        assert_eq!(summary, FlushSummary::default());
        assert!(storage.tables("metrics").is_empty());
        assert!(storage.insert_log().is_empty());
    }

    #[tokio::test]
    async fn test_static_mode_single_insert_for_many_tags() {
        let (mut sink, storage) = started_sink(SinkConfig::new("metrics")).await;
        let conn = storage.connect("localhost", 28015, "metrics").await.unwrap();
        storage.create_table(&conn, "log").await.unwrap();

        let summary = sink
            .write(&chunk(&[
                ("app", Some(100), "a"),
                ("sys", Some(101), "b"),
                ("db", Some(102), "c"),
            ]))
            .await
            .unwrap();

        assert_eq!(summary.batches_written, 1);
        assert_eq!(summary.records_written, 3);
        assert_eq!(storage.insert_log().len(), 1);
        assert_eq!(storage.insert_log()[0].table, "log");
    }

    #[tokio::test]
    async fn test_decode_failure_fails_flush_without_inserts() {
        let mut config = SinkConfig::new("metrics");
        config.auto_tag_table = true;
        let (mut sink, storage) = started_sink(config).await;

        let err = sink.write(b"[\"app\",").await.unwrap_err();

        assert!(matches!(err, SinkError::Decode(_)));
        assert!(storage.insert_log().is_empty());
    }

    #[tokio::test]
    async fn test_metrics_accumulate_across_flushes() {
        let mut config = SinkConfig::new("metrics");
        config.auto_tag_table = true;
        let (mut sink, _storage) = started_sink(config).await;

        sink.write(&chunk(&[("app", Some(100), "a")])).await.unwrap();
        sink.write(&chunk(&[("app", Some(101), "b"), ("sys", Some(102), "c")]))
            .await
            .unwrap();

        let metrics = sink.metrics();
        assert_eq!(metrics.flushes, 2);
        assert_eq!(metrics.events_total, 3);
        assert_eq!(metrics.records_written, 3);
        assert_eq!(metrics.batches_written, 3);
        assert_eq!(metrics.records_dropped, 0);
    }
}
