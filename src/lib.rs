pub mod config;
pub mod decode;
pub mod enrich;
pub mod errors;
pub mod route;
pub mod sink;
pub mod storage;
pub mod telemetry;

pub use config::SinkConfig;
pub use decode::{ChunkBuilder, ChunkReader, Event};
pub use errors::{Result, SinkError};
pub use sink::{FlushSummary, TableSink};
pub use storage::{MemoryStorage, Record, StorageClient, TableRef};
pub use telemetry::SinkMetrics;
