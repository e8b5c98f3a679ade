//! Typed record store over the SQLite tables.
//!
//! The store exposes one uniform contract for every record kind:
//! `get_all`, `get`, `put` (insert or upsert), and `delete`. Records map to
//! rows through the [`Record`] trait; rows come back in index order.

use crate::config::StorageKeys;
use crate::error::{CsmError, Result};
use crate::model::{Account, DATE_FORMAT, RecordKind, Task, TaskType, Vertical};
use crate::timing;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};
use std::fmt::Write as _;
use tracing::warn;

/// A value that can be persisted in one of the record tables.
pub trait Record: Sized {
    const KIND: RecordKind;

    /// Non-key columns, in the order [`Record::to_values`] binds them.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Option<i64>;

    fn to_values(&self) -> Vec<Value>;

    /// Build a record from a row selected as `id, COLUMNS...`.
    ///
    /// # Errors
    ///
    /// Returns [`CsmError::Parse`] when a stored value no longer decodes, or
    /// a storage error if the row cannot be read.
    fn from_row(row: &Row<'_>) -> Result<Self>;
}

/// An open record store: one connection plus the table names it targets.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    keys: StorageKeys,
}

impl Store {
    pub(crate) const fn new(conn: Connection, keys: StorageKeys) -> Self {
        Self { conn, keys }
    }

    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub const fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Table backing record kind `T`.
    #[must_use]
    pub fn table<T: Record>(&self) -> &str {
        match T::KIND {
            RecordKind::Task => self.keys.tasks(),
            RecordKind::Account => self.keys.accounts(),
        }
    }

    fn select_sql<T: Record>(&self) -> String {
        format!(
            "SELECT id, {} FROM {}",
            T::COLUMNS.join(", "),
            self.table::<T>()
        )
    }

    /// All records of kind `T`, in id order.
    ///
    /// Rows whose stored values no longer decode are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn get_all<T: Record>(&self) -> Result<Vec<T>> {
        timing::timed("store.get_all", || self.select_all())
    }

    fn select_all<T: Record>(&self) -> Result<Vec<T>> {
        let sql = format!("{} ORDER BY id ASC", self.select_sql::<T>());
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| CsmError::storage(format!("prepare {} listing", T::KIND), e))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| CsmError::storage(format!("list {} records", T::KIND), e))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            match T::from_row(row) {
                Ok(record) => records.push(record),
                Err(CsmError::Parse(reason)) => {
                    warn!(kind = %T::KIND, %reason, "skipping unreadable record");
                }
                Err(other) => return Err(other),
            }
        }
        Ok(records)
    }

    /// Fetch a single record by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails, or a parse error if the
    /// row exists but cannot be decoded.
    pub fn get<T: Record>(&self, id: i64) -> Result<Option<T>> {
        timing::timed("store.get", || self.select_one(id))
    }

    fn select_one<T: Record>(&self, id: i64) -> Result<Option<T>> {
        let sql = format!("{} WHERE id = ?1", self.select_sql::<T>());
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| CsmError::storage(format!("prepare {} lookup", T::KIND), e))?;
        let mut rows = stmt
            .query(params![id])
            .map_err(|e| CsmError::storage(format!("get {} {id}", T::KIND), e))?;

        match rows.next()? {
            Some(row) => T::from_row(row).map(Some),
            None => Ok(None),
        }
    }

    /// Whether a row with `id` exists, decodable or not.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn contains<T: Record>(&self, id: i64) -> Result<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", self.table::<T>());
        self.conn
            .query_row(&sql, params![id], |row| row.get(0))
            .map_err(|e| CsmError::storage(format!("check {} {id}", T::KIND), e))
    }

    /// Insert a record without an id, or upsert a record that carries one.
    ///
    /// Returns the id the record is stored under.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub fn put<T: Record>(&self, record: &T) -> Result<i64> {
        timing::timed("store.put", || self.write_row(record))
    }

    fn write_row<T: Record>(&self, record: &T) -> Result<i64> {
        let table = self.table::<T>();
        let mut values = record.to_values();

        let Some(id) = record.id() else {
            let placeholders = (1..=values.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                T::COLUMNS.join(", ")
            );
            self.conn
                .execute(&sql, params_from_iter(values.iter()))
                .map_err(|e| CsmError::storage(format!("insert {}", T::KIND), e))?;
            return Ok(self.conn.last_insert_rowid());
        };

        values.insert(0, Value::Integer(id));
        let placeholders = (1..=values.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut updates = String::new();
        for (i, column) in T::COLUMNS.iter().enumerate() {
            if i > 0 {
                updates.push_str(", ");
            }
            let _ = write!(updates, "{column} = excluded.{column}");
        }
        let sql = format!(
            "INSERT INTO {table} (id, {}) VALUES ({placeholders}) \
             ON CONFLICT(id) DO UPDATE SET {updates}",
            T::COLUMNS.join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(|e| CsmError::storage(format!("upsert {} {id}", T::KIND), e))?;
        Ok(id)
    }

    /// Delete a record by id. Returns `false` when nothing matched.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub fn delete<T: Record>(&self, id: i64) -> Result<bool> {
        timing::timed("store.delete", || {
            let sql = format!("DELETE FROM {} WHERE id = ?1", self.table::<T>());
            let changed = self
                .conn
                .execute(&sql, params![id])
                .map_err(|e| CsmError::storage(format!("delete {} {id}", T::KIND), e))?;
            Ok(changed > 0)
        })
    }

    /// Run `f` inside a single transaction; an error rolls everything back.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error, or a storage error if the transaction
    /// cannot begin or commit.
    pub fn in_transaction<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| CsmError::storage("begin transaction", e))?;
        let out = f(self)?;
        tx.commit()
            .map_err(|e| CsmError::storage("commit transaction", e))?;
        Ok(out)
    }
}

fn text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |v| Value::Text(v.to_string()))
}

fn date_value(date: Option<NaiveDate>) -> Value {
    date.map_or(Value::Null, |d| Value::Text(d.format(DATE_FORMAT).to_string()))
}

fn decode_date(kind: RecordKind, id: i64, field: &str, raw: Option<String>) -> Result<Option<NaiveDate>> {
    raw.filter(|v| !v.trim().is_empty())
        .map(|v| {
            NaiveDate::parse_from_str(v.trim(), DATE_FORMAT).map_err(|_| {
                CsmError::parse(format!("{kind} {id}: stored {field} '{v}' is not a date"))
            })
        })
        .transpose()
}

impl Record for Task {
    const KIND: RecordKind = RecordKind::Task;
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "type",
        "due",
        "completed",
        "account_id",
        "account_name",
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            Value::Text(self.task_type.as_str().to_string()),
            date_value(self.due),
            Value::Integer(i64::from(self.completed)),
            self.account_id.map_or(Value::Null, Value::Integer),
            text(self.account_name.as_deref()),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        let id: i64 = row.get(0)?;
        let raw_type: String = row.get(2)?;
        let task_type = raw_type.parse::<TaskType>().map_err(|_| {
            CsmError::parse(format!("task {id}: stored type '{raw_type}' is not a task type"))
        })?;
        let completed: Option<i64> = row.get(4)?;

        Ok(Self {
            id: Some(id),
            name: row.get(1)?,
            task_type,
            due: decode_date(Self::KIND, id, "due date", row.get(3)?)?,
            completed: completed.is_some_and(|v| v != 0),
            account_id: row.get(5)?,
            account_name: row.get(6)?,
        })
    }
}

impl Record for Account {
    const KIND: RecordKind = RecordKind::Account;
    const COLUMNS: &'static [&'static str] =
        &["name", "vertical", "sub_vertical", "arr", "renewal_date"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            text(self.vertical.map(Vertical::as_str)),
            text(self.sub_vertical.as_deref()),
            self.arr.map_or(Value::Null, Value::Real),
            date_value(self.renewal_date),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        let id: i64 = row.get(0)?;
        let raw_vertical: Option<String> = row.get(2)?;
        let vertical = raw_vertical
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.parse::<Vertical>().map_err(|_| {
                    CsmError::parse(format!("account {id}: stored vertical '{v}' is unknown"))
                })
            })
            .transpose()?;

        Ok(Self {
            id: Some(id),
            name: row.get(1)?,
            vertical,
            sub_vertical: row.get(3)?,
            arr: row.get(4)?,
            renewal_date: decode_date(Self::KIND, id, "renewal date", row.get(5)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use crate::model::{AccountInput, TaskInput};

    fn store() -> Store {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        let keys = StorageKeys::default();
        migrations::migrate(&mut conn, &keys).expect("migrate");
        Store::new(conn, keys)
    }

    fn task(name: &str, task_type: &str) -> Task {
        TaskInput::new(name, task_type).validate().expect("valid task")
    }

    #[test]
    fn put_without_id_assigns_increasing_ids() {
        let store = store();
        let first = store.put(&task("Exec sponsor intro", "EBC")).expect("insert");
        let second = store.put(&task("Seat expansion", "Upsell")).expect("insert");
        assert!(second > first);

        let all: Vec<Task> = store.get_all().expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, Some(first));
        assert_eq!(all[1].name, "Seat expansion");
    }

    #[test]
    fn put_with_id_upserts() {
        let store = store();
        let mut record = task("Renewal risk", "Risk");
        record.id = Some(40);
        assert_eq!(store.put(&record).expect("insert with id"), 40);

        record.name = "Renewal risk (escalated)".into();
        record.completed = true;
        assert_eq!(store.put(&record).expect("upsert"), 40);

        let stored: Task = store.get(40).expect("get").expect("exists");
        assert_eq!(stored.name, "Renewal risk (escalated)");
        assert!(stored.completed);
        assert_eq!(store.get_all::<Task>().expect("list").len(), 1);

        let next = store.put(&task("Follow-up", "Story")).expect("insert");
        assert!(next > 40, "autoincrement continues past explicit ids");
    }

    #[test]
    fn get_missing_returns_none() {
        let store = store();
        assert!(store.get::<Task>(999).expect("get").is_none());
        assert!(store.get::<Account>(999).expect("get").is_none());
    }

    #[test]
    fn delete_reports_whether_a_row_was_removed() {
        let store = store();
        let id = store.put(&task("Case study", "Story")).expect("insert");
        assert!(store.contains::<Task>(id).expect("contains"));
        assert!(!store.contains::<Account>(id).expect("contains"));
        assert!(store.delete::<Task>(id).expect("delete"));
        assert!(!store.contains::<Task>(id).expect("contains"));
        assert!(!store.delete::<Task>(id).expect("second delete is a no-op"));
        assert!(store.get::<Task>(id).expect("get").is_none());
    }

    #[test]
    fn account_fields_roundtrip() {
        let store = store();
        let account = AccountInput::new("Acme")
            .vertical("FINS", Some("Banking"))
            .arr("1200000.5")
            .renewal_date("2027-04-01")
            .validate()
            .expect("valid account");
        let id = store.put(&account).expect("insert");

        let stored: Account = store.get(id).expect("get").expect("exists");
        assert_eq!(stored.name, "Acme");
        assert_eq!(stored.vertical, Some(Vertical::Fins));
        assert_eq!(stored.sub_vertical.as_deref(), Some("Banking"));
        assert_eq!(stored.arr, Some(1_200_000.5));
        assert_eq!(stored.renewal_date, NaiveDate::from_ymd_opt(2027, 4, 1));
    }

    #[test]
    fn corrupt_rows_are_skipped_in_listings_but_fail_lookups() {
        let store = store();
        let good = store.put(&task("Good row", "Risk")).expect("insert");
        store
            .conn()
            .execute(
                "INSERT INTO csm_tasks (id, name, type, completed) VALUES (77, 'Bad row', 'Escalation', 0)",
                [],
            )
            .expect("raw insert");

        let all: Vec<Task> = store.get_all().expect("list survives a bad row");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, Some(good));

        let err = store.get::<Task>(77).expect_err("bad row cannot be decoded");
        assert!(matches!(err, CsmError::Parse(_)));
    }

    #[test]
    fn null_completed_reads_as_false() {
        let store = store();
        store
            .conn()
            .execute(
                "INSERT INTO csm_tasks (id, name, type, completed) VALUES (5, 'Legacy', 'Story', NULL)",
                [],
            )
            .expect("raw insert");
        let legacy: Task = store.get(5).expect("get").expect("exists");
        assert!(!legacy.completed);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = store();
        let result: Result<()> = store.in_transaction(|s| {
            s.put(&task("Inside tx", "Risk"))?;
            Err(CsmError::validation("abort"))
        });
        assert!(result.is_err());
        assert!(store.get_all::<Task>().expect("list").is_empty());
    }
}
