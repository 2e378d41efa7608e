use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::sink::FlushSummary;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "table_sink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Cumulative counters across the sink's lifetime, updated once per flush.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SinkMetrics {
    pub flushes: usize,
    pub events_total: usize,
    pub batches_written: usize,
    pub batches_dropped: usize,
    pub records_written: usize,
    pub records_dropped: usize,
}

impl SinkMetrics {
    pub(crate) fn observe(&mut self, summary: &FlushSummary) {
        self.flushes += 1;
        self.events_total += summary.events;
        self.batches_written += summary.batches_written;
        self.batches_dropped += summary.batches_dropped;
        self.records_written += summary.records_written;
        self.records_dropped += summary.records_dropped;
    }
}
