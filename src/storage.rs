use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::StorageError;

/// A record as submitted to storage: the enriched field map.
pub type Record = Map<String, Value>;

/// Named reference to a remote table. Handles obtained through dynamic
/// resolution refer to a table that existed at resolution time; handles
/// built with [`StorageClient::table`] are unchecked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    name: String,
}

impl TableRef {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Capability set of the storage engine, passed explicitly to the sink so
/// tests can substitute a double. The connection is a separate value the
/// sink owns for its whole lifetime and lends out per call.
#[async_trait]
pub trait StorageClient: Send + Sync {
    type Conn: Send + Sync;

    /// Opens the single long-lived connection used by every flush.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        database: &str,
    ) -> Result<Self::Conn, StorageError>;

    async fn close(&self, conn: Self::Conn) -> Result<(), StorageError>;

    /// Builds a reference to a table assumed to exist. No existence check.
    fn table(&self, name: &str) -> TableRef {
        TableRef {
            name: name.to_string(),
        }
    }

    /// Creates `name`, failing with [`StorageError::TableExists`] if it is
    /// already present.
    async fn create_table(
        &self,
        conn: &Self::Conn,
        name: &str,
    ) -> Result<TableRef, StorageError>;

    /// Appends `records` to `table` in one bulk call, returning the number
    /// of records written.
    async fn insert_many(
        &self,
        conn: &Self::Conn,
        table: &TableRef,
        records: Vec<Record>,
    ) -> Result<usize, StorageError>;
}

/// In-process storage engine backing the test suite and local development.
/// Tables live under the database named at connect time; every bulk insert
/// is appended to a call log for inspection.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    databases: HashMap<String, HashMap<String, Vec<Record>>>,
    insert_log: Vec<InsertCall>,
}

#[derive(Debug, Clone)]
pub struct InsertCall {
    pub database: String,
    pub table: String,
    pub records: usize,
}

pub struct MemoryConn {
    database: String,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().expect("storage state poisoned")
    }

    /// Tables present in `database`, sorted by name.
    pub fn tables(&self, database: &str) -> Vec<String> {
        let state = self.state();
        let mut names: Vec<String> = state
            .databases
            .get(database)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn rows(&self, database: &str, table: &str) -> Option<Vec<Record>> {
        self.state()
            .databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .cloned()
    }

    pub fn insert_log(&self) -> Vec<InsertCall> {
        self.state().insert_log.clone()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    type Conn = MemoryConn;

    async fn connect(
        &self,
        _host: &str,
        _port: u16,
        database: &str,
    ) -> Result<Self::Conn, StorageError> {
        self.state().databases.entry(database.to_string()).or_default();
        Ok(MemoryConn {
            database: database.to_string(),
        })
    }

    async fn close(&self, _conn: Self::Conn) -> Result<(), StorageError> {
        Ok(())
    }

    async fn create_table(
        &self,
        conn: &Self::Conn,
        name: &str,
    ) -> Result<TableRef, StorageError> {
        let mut state = self.state();
        let tables = state.databases.entry(conn.database.clone()).or_default();
        if tables.contains_key(name) {
            return Err(StorageError::TableExists(name.to_string()));
        }
        tables.insert(name.to_string(), Vec::new());
        Ok(self.table(name))
    }

    async fn insert_many(
        &self,
        conn: &Self::Conn,
        table: &TableRef,
        records: Vec<Record>,
    ) -> Result<usize, StorageError> {
        let mut state = self.state();
        let count = records.len();

        let rows = state
            .databases
            .get_mut(&conn.database)
            .and_then(|tables| tables.get_mut(table.name()))
            .ok_or_else(|| StorageError::TableMissing {
                table: table.name().to_string(),
            })?;
        rows.extend(records);

        state.insert_log.push(InsertCall {
            database: conn.database.clone(),
            table: table.name().to_string(),
            records: count,
        });
        Ok(count)
    }
}
