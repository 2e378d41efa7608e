use std::collections::HashMap;

use tracing::debug;

use crate::errors::{ResolveError, StorageError};
use crate::storage::{Record, StorageClient, TableRef};

/// Partitions enriched records into per-tag batches. Within-group order is
/// arrival order; groups come out in first-seen tag order.
pub fn group_by_tag(events: impl IntoIterator<Item = (String, Record)>) -> Vec<(String, Vec<Record>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Record>)> = Vec::new();

    for (tag, record) in events {
        match index.get(&tag) {
            Some(&slot) => groups[slot].1.push(record),
            None => {
                index.insert(tag.clone(), groups.len());
                groups.push((tag, vec![record]));
            }
        }
    }

    groups
}

/// Maps tag groups onto destination batches. Dynamic routing keeps one
/// batch per tag; static routing folds every group into the configured
/// table so a flush issues exactly one bulk insert.
pub fn route_groups(
    groups: Vec<(String, Vec<Record>)>,
    auto_tag_table: bool,
    table: &str,
) -> Vec<(String, Vec<Record>)> {
    if auto_tag_table {
        return groups;
    }

    let mut records = Vec::new();
    for (_, mut group) in groups {
        records.append(&mut group);
    }
    if records.is_empty() {
        Vec::new()
    } else {
        vec![(table.to_string(), records)]
    }
}

/// Returns a handle to a table guaranteed usable for insertion.
///
/// Static routing hands out an unchecked reference; administration of the
/// configured table is an operational concern. Dynamic routing provisions
/// idempotently: create, treat already-exists as the steady state, then
/// reference. Any other create failure aborts only this destination.
pub async fn resolve_table<C: StorageClient>(
    client: &C,
    conn: &C::Conn,
    name: &str,
    auto_tag_table: bool,
) -> Result<TableRef, ResolveError> {
    if !auto_tag_table {
        return Ok(client.table(name));
    }

    match client.create_table(conn, name).await {
        Ok(table) => {
            debug!("Created table {}", name);
            Ok(table)
        }
        Err(StorageError::TableExists(_)) => Ok(client.table(name)),
        Err(source) => Err(ResolveError {
            table: name.to_string(),
            source,
        }),
    }
}
