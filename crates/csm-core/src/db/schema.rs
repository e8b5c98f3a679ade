//! Canonical SQLite schema for the csm record store.
//!
//! Table names for tasks and accounts come from the configured
//! [`StorageKeys`], so every statement here is rendered per store. The keys
//! are validated identifiers, which makes splicing them into SQL safe.
//!
//! - the task table keeps one row per task, with `type`/`due`/`account_id`
//!   indexes for the filter paths
//! - the account table keeps one row per account
//! - `okr_targets` holds one target per task type
//! - `store_meta` records the schema version and the keys the store was
//!   created with

use crate::config::StorageKeys;

/// Migration v1: task table and store metadata.
#[must_use]
pub fn migration_v1_sql(keys: &StorageKeys) -> String {
    let tasks = keys.tasks();
    let accounts = keys.accounts();
    format!(
        r"
CREATE TABLE IF NOT EXISTS {tasks} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    due TEXT
);

CREATE INDEX IF NOT EXISTS idx_{tasks}_type
    ON {tasks}(type);

CREATE INDEX IF NOT EXISTS idx_{tasks}_due
    ON {tasks}(due);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    task_key TEXT NOT NULL,
    account_key TEXT NOT NULL
);

INSERT OR IGNORE INTO store_meta (
    id,
    schema_version,
    task_key,
    account_key
) VALUES (1, 1, '{tasks}', '{accounts}');
"
    )
}

/// Migration v2: accounts and the task → account reference.
#[must_use]
pub fn migration_v2_sql(keys: &StorageKeys) -> String {
    let tasks = keys.tasks();
    let accounts = keys.accounts();
    format!(
        r"
CREATE TABLE IF NOT EXISTS {accounts} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);

ALTER TABLE {tasks} ADD COLUMN account_id INTEGER;
ALTER TABLE {tasks} ADD COLUMN account_name TEXT;

CREATE INDEX IF NOT EXISTS idx_{tasks}_account
    ON {tasks}(account_id);
"
    )
}

/// Migration v3: completion state, account classification/ARR/renewal, and
/// OKR targets.
///
/// `completed` is added as a nullable column; rows that predate it are
/// filled in by the record backfill.
#[must_use]
pub fn migration_v3_sql(keys: &StorageKeys) -> String {
    let tasks = keys.tasks();
    let accounts = keys.accounts();
    format!(
        r"
ALTER TABLE {tasks} ADD COLUMN completed INTEGER
    CHECK (completed IS NULL OR completed IN (0, 1));

ALTER TABLE {accounts} ADD COLUMN vertical TEXT;
ALTER TABLE {accounts} ADD COLUMN sub_vertical TEXT;
ALTER TABLE {accounts} ADD COLUMN arr REAL;
ALTER TABLE {accounts} ADD COLUMN renewal_date TEXT;

CREATE INDEX IF NOT EXISTS idx_{accounts}_vertical
    ON {accounts}(vertical, sub_vertical);

CREATE TABLE IF NOT EXISTS okr_targets (
    task_type TEXT PRIMARY KEY CHECK (task_type IN ('Risk', 'Upsell', 'Story', 'EBC')),
    target INTEGER NOT NULL CHECK (target >= 1)
);
"
    )
}

/// Indexes expected after all migrations ran.
#[must_use]
pub fn required_indexes(keys: &StorageKeys) -> Vec<String> {
    let tasks = keys.tasks();
    let accounts = keys.accounts();
    vec![
        format!("idx_{tasks}_type"),
        format!("idx_{tasks}_due"),
        format!("idx_{tasks}_account"),
        format!("idx_{accounts}_vertical"),
    ]
}
