//! One-shot import of the browser-era flat store.
//!
//! The flat store kept each record kind as a single JSON array (the
//! `csm_tasks` and `csm_accounts` blobs). Ids were either integers or
//! base36 time-random strings. Integer-like ids are kept unless the store
//! already holds that id; every other id is replaced by a fresh one and task
//! references to it are rewritten.

use crate::db::{Record, Store};
use crate::error::Result;
use crate::model::{Account, AccountInput, Task, TaskInput};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTask {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    task_type: String,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    account_id: Value,
    #[serde(default)]
    account_name: Option<String>,
}

/// Legacy accounts also carried a `health` colour, which is dropped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyAccount {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
    #[serde(default)]
    vertical: Option<String>,
    #[serde(default)]
    sub_vertical: Option<String>,
    #[serde(default)]
    arr: Option<Value>,
    #[serde(default)]
    renewal_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LegacyReport {
    pub tasks_imported: usize,
    pub accounts_imported: usize,
    /// Records stored under a fresh id: non-numeric ids and ids already taken.
    pub ids_reassigned: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

impl LegacyReport {
    fn skip(&mut self, what: &str, index: usize, reason: impl std::fmt::Display) {
        let message = format!("{what} #{index}: {reason}");
        warn!(%message, "skipping legacy record");
        self.skipped += 1;
        self.warnings.push(message);
    }
}

/// Parse a blob into its array items. Unreadable blobs count as empty.
fn blob_items(label: &str, blob: Option<&str>, report: &mut LegacyReport) -> Vec<Value> {
    let Some(raw) = blob.map(str::trim).filter(|b| !b.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(items) => items,
        Err(e) => {
            let message = format!("{label} blob is not a JSON array ({e}); treating as empty");
            warn!(%message);
            report.warnings.push(message);
            Vec::new()
        }
    }
}

/// A legacy id usable as-is: a positive integer or an integer string.
fn canonical_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}

fn legacy_key(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn arr_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Import legacy blobs into the store. Accounts go first so task
/// references can be remapped.
///
/// Ids already present in the store are never overwritten, so running it
/// twice imports every record a second time under fresh ids.
///
/// # Errors
///
/// Returns a storage error if the store cannot be opened or the
/// transaction fails. Bad blobs and bad records are reported, not raised.
pub fn import_legacy(
    session: &mut Session,
    tasks_json: Option<&str>,
    accounts_json: Option<&str>,
) -> Result<LegacyReport> {
    let mut report = LegacyReport::default();
    let accounts = blob_items("accounts", accounts_json, &mut report);
    let tasks = blob_items("tasks", tasks_json, &mut report);

    let store = session.store()?;
    let report = store.in_transaction(move |store| {
        let remap = import_accounts(store, accounts, &mut report)?;
        import_tasks(store, tasks, &remap, &mut report)?;
        Ok(report)
    })?;

    info!(
        tasks = report.tasks_imported,
        accounts = report.accounts_imported,
        reassigned = report.ids_reassigned,
        skipped = report.skipped,
        "legacy import finished"
    );
    Ok(report)
}

/// Give up `id` if it is already taken; the record then gets a fresh one.
fn claim_id<T: Record>(
    store: &Store,
    id: Option<i64>,
    report: &mut LegacyReport,
) -> Result<Option<i64>> {
    let claimed = match id {
        Some(id) if store.contains::<T>(id)? => {
            warn!(kind = %T::KIND, id, "legacy id already in use; reassigning");
            None
        }
        other => other,
    };
    if claimed.is_none() {
        report.ids_reassigned += 1;
    }
    Ok(claimed)
}

fn import_accounts(
    store: &Store,
    items: Vec<Value>,
    report: &mut LegacyReport,
) -> Result<HashMap<String, (i64, String)>> {
    let mut pending = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        let legacy: LegacyAccount = match serde_json::from_value(item) {
            Ok(legacy) => legacy,
            Err(e) => {
                report.skip("account", index, e);
                continue;
            }
        };
        let input = AccountInput {
            name: legacy.name,
            vertical: legacy.vertical,
            sub_vertical: legacy.sub_vertical,
            arr: arr_text(legacy.arr.as_ref()),
            renewal_date: legacy.renewal_date,
        };
        match input.validate() {
            Ok(mut account) => {
                account.id = canonical_id(&legacy.id);
                pending.push((legacy_key(&legacy.id), account));
            }
            Err(e) => report.skip("account", index, e),
        }
    }

    // Kept ids go first so no fresh id handed out in this batch can be
    // claimed by a later kept one.
    pending.sort_by_key(|(_, account)| account.id.is_none());
    let mut remap = HashMap::new();
    for (key, mut account) in pending {
        account.id = claim_id::<Account>(store, account.id, report)?;
        let id = store.put(&account)?;
        if let Some(key) = key {
            remap.insert(key, (id, account.name));
        }
        report.accounts_imported += 1;
    }
    Ok(remap)
}

fn import_tasks(
    store: &Store,
    items: Vec<Value>,
    remap: &HashMap<String, (i64, String)>,
    report: &mut LegacyReport,
) -> Result<()> {
    let mut pending = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        let legacy: LegacyTask = match serde_json::from_value(item) {
            Ok(legacy) => legacy,
            Err(e) => {
                report.skip("task", index, e);
                continue;
            }
        };

        let (account_id, resolved_name) = match legacy_key(&legacy.account_id) {
            Some(key) => match remap.get(&key) {
                Some((id, name)) => (Some(*id), Some(name.clone())),
                None => match canonical_id(&legacy.account_id) {
                    Some(id) => (
                        Some(id),
                        store.get::<Account>(id)?.map(|a| a.name),
                    ),
                    None => (None, None),
                },
            },
            None => (None, None),
        };

        let input = TaskInput {
            name: legacy.name,
            task_type: legacy.task_type,
            due: legacy.due,
            completed: legacy.completed.unwrap_or(false),
            account_id,
        };
        let mut task = match input.validate() {
            Ok(task) => task,
            Err(e) => {
                report.skip("task", index, e);
                continue;
            }
        };
        task.id = canonical_id(&legacy.id);
        task.account_name = legacy
            .account_name
            .filter(|n| !n.trim().is_empty())
            .or(resolved_name);
        pending.push(task);
    }

    pending.sort_by_key(|task| task.id.is_none());
    for mut task in pending {
        task.id = claim_id::<Task>(store, task.id, report)?;
        store.put(&task)?;
        report.tasks_imported += 1;
    }
    Ok(())
}
