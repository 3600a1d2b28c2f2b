//! Connection bootstrap for the key-value store file.
//!
//! # Invariants
//! - Returned connections run in WAL journal mode when file-backed, so
//!   several execution contexts can read while one writes.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Opens the store file and applies all pending migrations.
///
/// # Side effects
/// - Creates the file when it does not exist yet.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_with(
        "file",
        || {
            Connection::open(path).map_err(|source| DbError::Open {
                path: path.to_path_buf(),
                source,
            })
        },
        true,
    )
}

/// Opens a private in-memory store and applies all pending migrations.
///
/// Every call yields an independent database; in-memory connections are
/// never shared between execution contexts.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(
        "memory",
        || Connection::open_in_memory().map_err(DbError::from),
        false,
    )
}

fn open_with<F>(mode: &'static str, connect: F, file_backed: bool) -> DbResult<Connection>
where
    F: FnOnce() -> DbResult<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = connect().and_then(|mut conn| bootstrap_connection(&mut conn, file_backed).map(|()| conn));

    match result {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, file_backed: bool) -> DbResult<()> {
    if file_backed {
        // journal_mode returns a row, so it cannot go through execute_batch.
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    }
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)?;
    Ok(())
}
