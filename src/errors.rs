use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Sink is not connected; call start() before write()")]
    NotConnected,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Chunk is not valid UTF-8: {reason}")]
    Encoding { reason: String },

    #[error("Malformed chunk at byte offset {offset}: {reason}")]
    Frame { offset: usize, reason: String },

    #[error("Malformed field payload for tag {tag}: {reason}")]
    Payload { tag: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Open {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Failed to close connection: {reason}")]
    Close { reason: String },
}

/// Errors surfaced by a [`StorageClient`](crate::storage::StorageClient)
/// implementation. `TableExists` is the steady-state outcome of idempotent
/// table provisioning, not a failure of the flush.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {table} does not exist")]
    TableMissing { table: String },

    #[error("Storage engine unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage engine rejected the request: {reason}")]
    Rejected { reason: String },
}

impl StorageError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StorageError::TableExists(_))
    }
}

/// Table resolution failed for one destination. Aborts that group's
/// submission only; sibling groups in the same flush continue.
#[derive(Error, Debug)]
#[error("Could not resolve table {table}: {source}")]
pub struct ResolveError {
    pub table: String,
    #[source]
    pub source: StorageError,
}

pub type Result<T> = std::result::Result<T, SinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_classification() {
        assert!(StorageError::TableExists("app".to_string()).is_already_exists());
        assert!(
            !StorageError::Unavailable {
                reason: "down".to_string()
            }
            .is_already_exists()
        );
    }

    #[test]
    fn test_resolve_error_carries_destination() {
        let err = ResolveError {
            table: "app".to_string(),
            source: StorageError::Rejected {
                reason: "quota".to_string(),
            },
        };

        let rendered = err.to_string();
        assert!(rendered.contains("app"), "message should name the table: {rendered}");
        assert!(rendered.contains("quota"));
    }

    #[test]
    fn test_sink_error_from_decode() {
        let decode = DecodeError::Frame {
            offset: 12,
            reason: "expected value".to_string(),
        };

        let err = SinkError::from(decode);
        assert!(matches!(err, SinkError::Decode(_)));
        assert!(err.to_string().contains("offset 12"));
    }
}
