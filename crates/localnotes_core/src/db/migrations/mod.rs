//! Schema steps for the key-value store file.
//!
//! # Invariants
//! - Steps are listed in strictly increasing version order.
//! - The highest applied step is mirrored to `PRAGMA user_version`.
//! - All pending steps apply in one immediate transaction, so two contexts
//!   opening a fresh file together never both run the same step.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

/// `(version, sql)` pairs.
const SCHEMA_STEPS: &[(u32, &str)] = &[(1, include_str!("0001_kv_entries.sql"))];

/// Returns the latest schema version this build can read and write.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |(version, _)| *version)
}

/// Reads the schema version recorded in the store file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings the store file up to [`latest_version`].
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let latest = latest_version();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let found = schema_version(&tx)?;
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let pending = SCHEMA_STEPS
        .iter()
        .filter(|(version, _)| *version > found)
        .collect::<Vec<_>>();
    for (version, sql) in &pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", *version)?;
    }
    tx.commit()?;

    if !pending.is_empty() {
        info!(
            "event=db_migrate module=db status=ok from_version={found} to_version={latest} steps={}",
            pending.len()
        );
    }
    Ok(())
}
