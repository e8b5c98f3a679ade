//! Record backfill run on every store open.
//!
//! Older schema versions wrote task rows without a `completed` value, and
//! hand-edited or imported stores can carry account references that are not
//! integer ids or blank due dates. The backfill rewrites those rows into the
//! shape current code expects. It only touches rows that need it, so a
//! second run is a no-op.

use crate::db::Store;
use crate::error::{CsmError, Result};
use serde::Serialize;

/// What a backfill pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Task rows present when the pass started.
    pub scanned: usize,
    /// Rows whose missing `completed` was set to false.
    pub completed_backfilled: usize,
    /// Rows whose non-integer `account_id` was cleared.
    pub account_refs_cleared: usize,
    /// Rows whose empty-string due date became NULL.
    pub blank_dates_cleared: usize,
}

impl BackfillReport {
    #[must_use]
    pub const fn changed(&self) -> usize {
        self.completed_backfilled + self.account_refs_cleared + self.blank_dates_cleared
    }
}

/// Backfill task rows written by older versions.
///
/// # Errors
///
/// Returns a storage error if any statement fails; the pass is transactional.
pub fn backfill_tasks(store: &Store) -> Result<BackfillReport> {
    let tasks = store.keys().tasks().to_string();

    store.in_transaction(|store| {
        let conn = store.conn();
        let scanned: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {tasks}"), [], |row| row.get(0))
            .map_err(|e| CsmError::storage("count tasks for backfill", e))?;

        let completed_backfilled = conn
            .execute(
                &format!("UPDATE {tasks} SET completed = 0 WHERE completed IS NULL"),
                [],
            )
            .map_err(|e| CsmError::storage("backfill task completion", e))?;

        let account_refs_cleared = conn
            .execute(
                &format!(
                    "UPDATE {tasks} SET account_id = NULL \
                     WHERE account_id IS NOT NULL AND typeof(account_id) <> 'integer'"
                ),
                [],
            )
            .map_err(|e| CsmError::storage("coerce task account references", e))?;

        let blank_dates_cleared = conn
            .execute(
                &format!("UPDATE {tasks} SET due = NULL WHERE due IS NOT NULL AND trim(due) = ''"),
                [],
            )
            .map_err(|e| CsmError::storage("clear blank due dates", e))?;

        Ok(BackfillReport {
            scanned: usize::try_from(scanned).unwrap_or(0),
            completed_backfilled,
            account_refs_cleared,
            blank_dates_cleared,
        })
    })
}
