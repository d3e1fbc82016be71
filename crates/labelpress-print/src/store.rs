// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Durable storage for the offline bookkeeping queue, backed by SQLite.
//
// Entries are kept in insertion order via an autoincrement sequence so a
// restarted process drains them in the order they were queued.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info, instrument};

use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::types::{EntryId, OfflineQueueEntry, PrintRecordPayload, QueueEntryKind};

use crate::lock;

/// SQLite schema for the queue table.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS offline_queue (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        params TEXT NOT NULL,
        queued_at TEXT NOT NULL
    )
"#;

/// Persistence the offline queue writes through to.
pub trait QueueStore: Send + Sync {
    /// All stored entries, oldest first.
    fn load(&self) -> Result<Vec<OfflineQueueEntry>>;

    fn append(&self, entry: &OfflineQueueEntry) -> Result<()>;

    /// Remove an entry.  Removing a missing entry is not an error.
    fn remove(&self, id: &EntryId) -> Result<()>;
}

/// Queue store backed by a SQLite database.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so it sits behind a
/// mutex.  Every statement is a sub-millisecond single-row operation.
pub struct SqliteQueueStore {
    conn: Mutex<Connection>,
}

impl SqliteQueueStore {
    /// Open (or create) the queue database at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| LabelpressError::Database(format!("open: {e}")))?;

        // WAL survives unclean shutdowns on mobile more gracefully.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| LabelpressError::Database(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| LabelpressError::Database(format!("create table: {e}")))?;

        info!("offline queue database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LabelpressError::Database(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| LabelpressError::Database(format!("create table: {e}")))?;

        debug!("in-memory offline queue database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl QueueStore for SqliteQueueStore {
    #[instrument(skip(self))]
    fn load(&self) -> Result<Vec<OfflineQueueEntry>> {
        let conn = lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT id, kind, params, queued_at FROM offline_queue ORDER BY seq ASC")
            .map_err(|e| LabelpressError::Database(format!("prepare load: {e}")))?;

        let entries = stmt
            .query_map([], row_to_entry)
            .map_err(|e| LabelpressError::Database(format!("query load: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LabelpressError::Database(format!("collect rows: {e}")))?;

        debug!(count = entries.len(), "loaded offline queue");
        Ok(entries)
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.id))]
    fn append(&self, entry: &OfflineQueueEntry) -> Result<()> {
        let kind_json = serde_json::to_string(&entry.kind)?;
        let params_json = serde_json::to_string(&entry.params)?;

        lock(&self.conn)
            .execute(
                "INSERT INTO offline_queue (id, kind, params, queued_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.id.to_string(),
                    kind_json,
                    params_json,
                    entry.queued_at.to_rfc3339(),
                ],
            )
            .map_err(|e| LabelpressError::Database(format!("insert entry: {e}")))?;

        debug!(entry_id = %entry.id, "entry persisted");
        Ok(())
    }

    #[instrument(skip(self), fields(entry_id = %id))]
    fn remove(&self, id: &EntryId) -> Result<()> {
        lock(&self.conn)
            .execute("DELETE FROM offline_queue WHERE id = ?1", params![id.to_string()])
            .map_err(|e| LabelpressError::Database(format!("delete entry: {e}")))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Column indices must match the SELECT order in `load`.
fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<OfflineQueueEntry> {
    let id_str: String = row.get(0)?;
    let kind_json: String = row.get(1)?;
    let params_json: String = row.get(2)?;
    let queued_at_str: String = row.get(3)?;

    let uuid = uuid::Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let kind: QueueEntryKind = serde_json::from_str(&kind_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let params: PrintRecordPayload = serde_json::from_str(&params_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let queued_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&queued_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(OfflineQueueEntry {
        id: EntryId(uuid),
        kind,
        params,
        queued_at,
    })
}
