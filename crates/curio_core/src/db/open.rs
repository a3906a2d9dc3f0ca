//! Connection bootstrap.
//!
//! # Invariants
//! - `foreign_keys` is on before any migration runs, so cascades declared by
//!   the schema are live for every caller.
//! - A connection is only handed out after migrations succeed.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) the store at `path`.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with("file", || Connection::open(path))
}

/// Opens a private in-memory store; every call starts empty.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", Connection::open_in_memory)
}

fn open_with(
    mode: &'static str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = connect().map_err(DbError::from).and_then(|mut conn| {
        let applied = prepare(&mut conn)?;
        Ok((conn, applied))
    });
    let elapsed_ms = started_at.elapsed().as_millis();

    match result {
        Ok((conn, applied)) => {
            info!(
                "event=db_open module=db status=ok mode={mode} migrations_applied={applied} duration_ms={elapsed_ms}"
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={elapsed_ms} error={err}"
            );
            Err(err)
        }
    }
}

fn prepare(conn: &mut Connection) -> DbResult<usize> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
