//! Versioned schema migrations for the record store.

use super::schema;
use crate::config::StorageKeys;
use crate::error::{CsmError, Result};
use rusqlite::{Connection, OptionalExtension, types::Type};

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 3;

type MigrationSql = fn(&StorageKeys) -> String;

const MIGRATIONS: &[(u32, MigrationSql)] = &[
    (1, schema::migration_v1_sql),
    (2, schema::migration_v2_sql),
    (3, schema::migration_v3_sql),
];

/// Read `PRAGMA user_version` and convert it to a Rust `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the version value cannot be
/// represented as `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order.
///
/// Each migration runs only when `version > user_version`, inside its own
/// transaction, so a failure leaves the store at the last good version.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection, keys: &StorageKeys) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(&sql(keys))?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(*version)],
        )?;
        tx.commit()?;
        tracing::debug!(version, "applied schema migration");
        current = *version;
    }

    Ok(current)
}

/// Check that the store was created with the same storage keys.
///
/// # Errors
///
/// Returns [`CsmError::KeyMismatch`] when the recorded keys differ, or a
/// storage error if `store_meta` cannot be read.
pub fn verify_keys(conn: &Connection, keys: &StorageKeys) -> Result<()> {
    let stored: Option<(String, String)> = conn
        .query_row(
            "SELECT task_key, account_key FROM store_meta WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| CsmError::storage("read store_meta", e))?;

    match stored {
        Some((tasks, accounts)) if tasks == keys.tasks() && accounts == keys.accounts() => Ok(()),
        Some((tasks, accounts)) => Err(CsmError::KeyMismatch {
            stored: format!("{tasks}/{accounts}"),
            configured: format!("{}/{}", keys.tasks(), keys.accounts()),
        }),
        None => Err(CsmError::parse("store_meta row is missing")),
    }
}
