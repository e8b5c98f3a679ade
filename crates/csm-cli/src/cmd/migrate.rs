//! `csm migrate`: bring the store to the latest schema and pull in legacy data.

use crate::cmd::import::write_warnings;
use crate::cmd::load_project;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use csm_core::Session;
use csm_core::db;
use csm_core::legacy::{self, LegacyReport};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// JSON array of tasks exported from the legacy browser tracker.
    #[arg(long)]
    pub legacy_tasks: Option<PathBuf>,

    /// JSON array of accounts exported from the legacy browser tracker.
    #[arg(long)]
    pub legacy_accounts: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct MigrateOutput {
    from_version: u32,
    to_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    legacy: Option<LegacyReport>,
}

fn read_blob(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|p| {
        std::fs::read_to_string(p).with_context(|| format!("Failed to read {}", p.display()))
    })
    .transpose()
}

/// Execute `csm migrate`.
///
/// Opening the store applies pending schema migrations and backfills;
/// legacy blobs are imported afterwards in one transaction.
///
/// # Errors
///
/// Returns an error if the project cannot be opened, a blob file cannot be
/// read, or the store fails.
pub fn run_migrate(args: &MigrateArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config = load_project(project_root)?;
    let tasks_json = read_blob(args.legacy_tasks.as_deref())?;
    let accounts_json = read_blob(args.legacy_accounts.as_deref())?;

    let from_version = db::stored_schema_version(&config.db_path)?;
    let mut session = Session::from_config(&config);
    session.store()?;
    let to_version = db::stored_schema_version(&config.db_path)?;

    let legacy = if tasks_json.is_some() || accounts_json.is_some() {
        Some(legacy::import_legacy(
            &mut session,
            tasks_json.as_deref(),
            accounts_json.as_deref(),
        )?)
    } else {
        None
    };

    let result = MigrateOutput {
        from_version,
        to_version,
        legacy,
    };
    render_mode(
        output,
        &result,
        |r, w| {
            write!(w, "schema\t{}\t{}", r.from_version, r.to_version)?;
            if let Some(l) = &r.legacy {
                write!(
                    w,
                    "\tlegacy\t{}\t{}\t{}",
                    l.accounts_imported, l.tasks_imported, l.skipped
                )?;
            }
            writeln!(w)
        },
        |r, w| {
            pretty_section(w, "Record store")?;
            if r.from_version == r.to_version {
                pretty_kv(w, "Schema", format!("v{} (up to date)", r.to_version))?;
            } else {
                pretty_kv(w, "Schema", format!("v{} -> v{}", r.from_version, r.to_version))?;
            }
            if let Some(l) = &r.legacy {
                writeln!(w)?;
                pretty_section(w, "Legacy import")?;
                pretty_kv(w, "Accounts", l.accounts_imported.to_string())?;
                pretty_kv(w, "Tasks", l.tasks_imported.to_string())?;
                pretty_kv(w, "New ids", l.ids_reassigned.to_string())?;
                pretty_kv(w, "Skipped", l.skipped.to_string())?;
                write_warnings(w, &l.warnings)?;
            }
            Ok(())
        },
    )
}
