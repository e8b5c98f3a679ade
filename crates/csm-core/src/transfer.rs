//! CSV import and export of tasks and accounts.
//!
//! Exports write the fixed header row followed by one row per record in
//! store order. Imports match headers by name (case-insensitive, any
//! order), skip rows they cannot use, and write everything else in a single
//! transaction.

use crate::csv::{CsvReader, write_record};
use crate::db::{Record, Store};
use crate::error::{CsmError, Result};
use crate::model::{Account, AccountInput, Task, TaskInput, format_optional_date};
use crate::session::Session;
use crate::timing;
use serde::Serialize;
use tracing::{info, warn};

pub const TASK_HEADERS: [&str; 7] = [
    "ID",
    "Name",
    "Type",
    "Account ID",
    "Account Name",
    "Due Date",
    "Completed",
];

pub const ACCOUNT_HEADERS: [&str; 6] = [
    "ID",
    "Name",
    "ARR",
    "Renewal Date",
    "Vertical",
    "Sub-Vertical",
];

/// Outcome of an import: rows written, rows skipped, and why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

impl ImportReport {
    fn skip(&mut self, line: usize, reason: impl std::fmt::Display) {
        let message = format!("line {line}: {reason}");
        warn!(%message, "skipping import row");
        self.skipped += 1;
        self.warnings.push(message);
    }
}

// Export

#[must_use]
pub fn tasks_to_csv(tasks: &[Task]) -> String {
    let mut out = String::new();
    write_record(&mut out, &TASK_HEADERS);
    for task in tasks {
        write_record(
            &mut out,
            &[
                id_field(task.id),
                task.name.clone(),
                task.task_type.to_string(),
                id_field(task.account_id),
                task.account_name.clone().unwrap_or_default(),
                format_optional_date(task.due),
                if task.completed { "TRUE" } else { "FALSE" }.to_string(),
            ],
        );
    }
    out
}

#[must_use]
pub fn accounts_to_csv(accounts: &[Account]) -> String {
    let mut out = String::new();
    write_record(&mut out, &ACCOUNT_HEADERS);
    for account in accounts {
        write_record(
            &mut out,
            &[
                id_field(account.id),
                account.name.clone(),
                account.arr.map(|arr| arr.to_string()).unwrap_or_default(),
                format_optional_date(account.renewal_date),
                account.vertical.map(|v| v.to_string()).unwrap_or_default(),
                account.sub_vertical.clone().unwrap_or_default(),
            ],
        );
    }
    out
}

/// A finished export: the CSV text and how many records it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub csv: String,
    pub records: usize,
}

/// All tasks as CSV.
///
/// # Errors
///
/// Returns a storage error if listing fails.
pub fn export_tasks(session: &mut Session) -> Result<Export> {
    let tasks = session.list_tasks()?;
    info!(count = tasks.len(), "exporting tasks");
    Ok(Export {
        csv: timing::timed("csv.encode", || tasks_to_csv(&tasks)),
        records: tasks.len(),
    })
}

/// All accounts as CSV.
///
/// # Errors
///
/// Returns a storage error if listing fails.
pub fn export_accounts(session: &mut Session) -> Result<Export> {
    let accounts = session.list_accounts()?;
    info!(count = accounts.len(), "exporting accounts");
    Ok(Export {
        csv: timing::timed("csv.encode", || accounts_to_csv(&accounts)),
        records: accounts.len(),
    })
}

fn id_field(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

// Import

/// Header positions for one import file.
struct Columns {
    positions: Vec<usize>,
    width: usize,
}

impl Columns {
    fn resolve(header: &[String], wanted: &[&str]) -> Result<Self> {
        let normalized: Vec<String> = header
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        let mut positions = Vec::with_capacity(wanted.len());
        let mut missing = Vec::new();
        for name in wanted {
            let lower = name.to_ascii_lowercase();
            match normalized.iter().position(|h| *h == lower) {
                Some(pos) => positions.push(pos),
                None => missing.push(*name),
            }
        }
        if !missing.is_empty() {
            return Err(CsmError::MalformedImport(format!(
                "missing column(s): {}",
                missing.join(", ")
            )));
        }
        Ok(Self {
            positions,
            width: header.len(),
        })
    }
}

/// One data row viewed through the resolved header.
struct Fields<'a> {
    columns: &'a Columns,
    values: &'a [String],
}

impl Fields<'_> {
    /// Trimmed value of the `n`th wanted column.
    fn get(&self, n: usize) -> &str {
        self.columns
            .positions
            .get(n)
            .and_then(|&pos| self.values.get(pos))
            .map_or("", |v| v.trim())
    }

    fn optional(&self, n: usize) -> Option<String> {
        Some(self.get(n)).filter(|v| !v.is_empty()).map(str::to_string)
    }
}

fn parse_id(field: &str, raw: &str) -> Result<Option<i64>> {
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(Some(id)),
        _ => Err(CsmError::validation(format!(
            "invalid {field} '{raw}': expected a positive integer"
        ))),
    }
}

fn parse_completed(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "" | "false" | "no" | "0" => Ok(false),
        _ => Err(CsmError::validation(format!(
            "invalid Completed '{raw}': expected TRUE or FALSE"
        ))),
    }
}

fn import_records<T: Record>(
    session: &mut Session,
    input: &str,
    wanted: &[&str],
    build: impl Fn(&Store, &Fields<'_>) -> Result<T>,
) -> Result<ImportReport> {
    let mut reader = CsvReader::new(input);
    let header = match reader.next() {
        Some(Ok(record)) => record.fields,
        Some(Err(e)) => return Err(CsmError::MalformedImport(e.to_string())),
        None => return Err(CsmError::MalformedImport("file is empty".into())),
    };
    let columns = Columns::resolve(&header, wanted)?;

    let store = session.store()?;
    let report = store.in_transaction(|store| {
        let mut report = ImportReport::default();
        let mut pending = Vec::new();
        for record in reader.by_ref() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    report.skipped += 1;
                    warn!(error = %e, "skipping malformed trailing record");
                    report.warnings.push(e.to_string());
                    continue;
                }
            };
            if record.fields.len() != columns.width {
                report.skip(
                    record.line,
                    format_args!(
                        "expected {} columns, found {}",
                        columns.width,
                        record.fields.len()
                    ),
                );
                continue;
            }
            let fields = Fields {
                columns: &columns,
                values: &record.fields,
            };
            match timing::timed("import.row", || build(store, &fields)) {
                Ok(item) => pending.push((record.line, item)),
                Err(e) => report.skip(record.line, e),
            }
        }

        // Rows with an explicit ID go first so no id assigned to a blank-ID
        // row can be overwritten by a later row of the same file.
        pending.sort_by_key(|(_, item)| item.id().is_none());
        for (line, item) in pending {
            match store.put(&item) {
                Ok(_) => report.imported += 1,
                Err(e) => report.skip(line, e),
            }
        }
        Ok(report)
    })?;

    info!(
        kind = %T::KIND,
        imported = report.imported,
        skipped = report.skipped,
        "import finished"
    );
    Ok(report)
}

/// Import tasks from CSV text.
///
/// A blank `ID` creates a new task; a numeric one overwrites or creates
/// that id. Rows with an `ID` are written before blank-`ID` rows. `Account Name` is taken from the file, falling back to the
/// referenced account when blank.
///
/// # Errors
///
/// Returns [`CsmError::MalformedImport`] when the header is unusable, or a
/// storage error if the transaction fails. Bad rows are reported, not raised.
pub fn import_tasks(session: &mut Session, input: &str) -> Result<ImportReport> {
    import_records(session, input, &TASK_HEADERS, |store, row| {
        let id = parse_id("ID", row.get(0))?;
        if row.get(1).is_empty() {
            return Err(CsmError::validation("missing Name"));
        }
        if row.get(2).is_empty() {
            return Err(CsmError::validation("missing Type"));
        }
        let account_id = parse_id("Account ID", row.get(3))?;
        let input = TaskInput {
            name: row.get(1).to_string(),
            task_type: row.get(2).to_string(),
            due: row.optional(5),
            completed: parse_completed(row.get(6))?,
            account_id,
        };
        let mut task = input.validate()?;
        task.id = id;
        task.account_name = match (row.optional(4), account_id) {
            (Some(name), _) => Some(name),
            (None, Some(account_id)) => store.get::<Account>(account_id)?.map(|a| a.name),
            (None, None) => None,
        };
        Ok(task)
    })
}

/// Import accounts from CSV text.
///
/// # Errors
///
/// Returns [`CsmError::MalformedImport`] when the header is unusable, or a
/// storage error if the transaction fails. Bad rows are reported, not raised.
pub fn import_accounts(session: &mut Session, input: &str) -> Result<ImportReport> {
    import_records(session, input, &ACCOUNT_HEADERS, |_, row| {
        let id = parse_id("ID", row.get(0))?;
        if row.get(1).is_empty() {
            return Err(CsmError::validation("missing Name"));
        }
        let input = AccountInput {
            name: row.get(1).to_string(),
            arr: row.optional(2),
            renewal_date: row.optional(3),
            vertical: row.optional(4),
            sub_vertical: row.optional(5),
        };
        let mut account = input.validate()?;
        account.id = id;
        Ok(account)
    })
}
