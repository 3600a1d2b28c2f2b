//! SQLite-backed durable key-value store.
//!
//! # Responsibility
//! - Persist field payloads in `kv_entries` so they survive restarts.
//! - Detect writes made by other execution contexts (other handles or
//!   other processes on the same file) and announce them locally.
//!
//! # Invariants
//! - Every `set` stamps the row with a fresh global `revision` and the
//!   writer's context id.
//! - `poll_external_changes` announces each foreign revision at most once
//!   and never announces this context's own writes.
//! - Concurrent writers to one key are not serialized here; the last
//!   committed write wins.

use crate::db::{open_db, open_db_in_memory};
use crate::store::{
    ChangeHub, ContextId, KeyValueStore, StoreChange, StoreResult, Subscription,
};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::Cell;
use std::path::Path;
use uuid::Uuid;

/// One execution context's connection to a store file.
pub struct SqliteStore {
    conn: Connection,
    context_id: ContextId,
    hub: ChangeHub,
    last_seen_revision: Cell<i64>,
}

impl SqliteStore {
    /// Opens (or creates) the store file at `path` as a new context.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(open_db(path)?)
    }

    /// Opens a private in-memory store. Nothing is shared or persisted.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(open_db_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        // Values present at open time are read directly by `get`; only later
        // revisions count as external changes.
        let last_seen = max_revision(&conn)?;
        Ok(Self {
            conn,
            context_id: Uuid::new_v4(),
            hub: ChangeHub::new(),
            last_seen_revision: Cell::new(last_seen),
        })
    }

    /// Highest revision this context has already accounted for.
    pub fn last_seen_revision(&self) -> i64 {
        self.last_seen_revision.get()
    }
}

impl KeyValueStore for SqliteStore {
    fn context_id(&self) -> ContextId {
        self.context_id
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO kv_entries (key, value, revision, writer)
             VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(revision), 0) + 1 FROM kv_entries),
                ?3
             )
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                revision = excluded.revision,
                writer = excluded.writer
             WHERE kv_entries.value <> excluded.value;",
            params![key, value, self.context_id.to_string()],
        )?;
        Ok(())
    }

    fn subscribe(&self) -> StoreResult<Subscription> {
        Ok(self.hub.subscribe(self.context_id))
    }

    fn poll_external_changes(&self) -> StoreResult<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value, revision, writer
             FROM kv_entries
             WHERE revision > ?1
             ORDER BY revision ASC;",
        )?;
        let mut rows = stmt.query([self.last_seen_revision.get()])?;
        let own_writer = self.context_id.to_string();
        let mut announced = 0;

        while let Some(row) = rows.next()? {
            let revision: i64 = row.get("revision")?;
            let writer: String = row.get("writer")?;
            self.last_seen_revision
                .set(self.last_seen_revision.get().max(revision));
            if writer == own_writer {
                continue;
            }

            let change = StoreChange {
                key: row.get("key")?,
                new_value: row.get("value")?,
            };
            debug!(
                "event=store_external_change module=store status=ok key={} revision={}",
                change.key, revision
            );
            self.hub.broadcast(&change);
            announced += 1;
        }

        Ok(announced)
    }
}

fn max_revision(conn: &Connection) -> StoreResult<i64> {
    let revision = conn.query_row(
        "SELECT COALESCE(MAX(revision), 0) FROM kv_entries;",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(revision)
}
