//! SQLite record store utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so a reader in one shell never blocks a writer in another
//! - `busy_timeout = 5s` to ride out short lock contention between invocations
//! - `synchronous = NORMAL`, which is durable enough under WAL

pub mod migrations;
pub mod schema;
pub mod store;

pub use store::{Record, Store};

use crate::backfill;
use crate::config::StorageKeys;
use crate::error::{CsmError, Result};
use crate::timing;
use rusqlite::{Connection, OpenFlags};
use std::{path::Path, time::Duration};
use tracing::info;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the record store, apply runtime pragmas, migrate the
/// schema to the latest version, and backfill records written by older
/// versions.
///
/// # Errors
///
/// Returns a storage error if opening/configuring/migrating the database
/// fails, or [`CsmError::KeyMismatch`] if the store was created with other
/// storage keys.
pub fn open_store(path: &Path, keys: &StorageKeys) -> Result<Store> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CsmError::Storage {
            context: format!("create store directory {}: {e}", parent.display()),
            source: None,
        })?;
    }

    let mut conn = timing::timed("store.open", || {
        let conn = Connection::open(path).map_err(|e| {
            CsmError::storage(format!("open record store {}", path.display()), e)
        })?;
        configure_connection(&conn)
            .map_err(|e| CsmError::storage("configure sqlite pragmas", e))?;
        Ok::<_, CsmError>(conn)
    })?;
    timing::timed("store.migrate", || prepare_schema(&mut conn, keys))?;

    let store = Store::new(conn, keys.clone());
    let report = timing::timed("store.backfill", || backfill::backfill_tasks(&store))?;
    if report.changed() > 0 {
        info!(
            scanned = report.scanned,
            completed = report.completed_backfilled,
            account_refs = report.account_refs_cleared,
            blank_dates = report.blank_dates_cleared,
            "backfilled task records"
        );
    }
    Ok(store)
}

/// Schema version of the store at `path` without migrating it.
///
/// A missing file reports version 0.
///
/// # Errors
///
/// Returns a storage error if the file exists but cannot be read.
pub fn stored_schema_version(path: &Path) -> Result<u32> {
    if !path.exists() {
        return Ok(0);
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| CsmError::storage(format!("open record store {}", path.display()), e))?;
    migrations::current_schema_version(&conn)
        .map_err(|e| CsmError::storage("read schema version", e))
}

/// Migrate `conn` to the latest schema for `keys`.
///
/// An existing store is checked against `keys` before any DDL runs so a
/// renamed key never half-migrates a fresh table.
///
/// # Errors
///
/// Returns a storage error if a migration fails or a key-mismatch error.
pub fn prepare_schema(conn: &mut Connection, keys: &StorageKeys) -> Result<()> {
    let version = migrations::current_schema_version(conn)
        .map_err(|e| CsmError::storage("read schema version", e))?;
    if version > 0 {
        migrations::verify_keys(conn, keys)?;
    }
    let applied = migrations::migrate(conn, keys)
        .map_err(|e| CsmError::storage("apply schema migrations", e))?;
    if applied != version {
        info!(from = version, to = applied, "record store schema migrated");
    }
    migrations::verify_keys(conn, keys)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
