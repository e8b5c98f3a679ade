//! `csm export`: write records as CSV.

use crate::cmd::open_session;
use crate::output::{OutputMode, pretty_kv, render_mode};
use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use csm_core::model::RecordKind;
use csm_core::transfer;
use serde::Serialize;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Which record collection a CSV file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Collection {
    Tasks,
    Accounts,
}

impl Collection {
    pub const fn kind(self) -> RecordKind {
        match self {
            Self::Tasks => RecordKind::Task,
            Self::Accounts => RecordKind::Account,
        }
    }
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Records to export.
    #[arg(value_enum)]
    pub collection: Collection,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ExportOutput {
    kind: RecordKind,
    path: String,
    records: usize,
}

/// Execute `csm export`.
///
/// Without `--output` the CSV goes to stdout verbatim in every output mode.
///
/// # Errors
///
/// Returns an error if the project cannot be opened, the store fails, or
/// the file cannot be written.
pub fn run_export(args: &ExportArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let mut session = open_session(project_root)?;

    let transfer::Export { csv, records } = match args.collection {
        Collection::Tasks => transfer::export_tasks(&mut session)?,
        Collection::Accounts => transfer::export_accounts(&mut session)?,
    };

    let Some(path) = &args.output else {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        out.write_all(csv.as_bytes())?;
        out.flush()?;
        return Ok(());
    };

    std::fs::write(path, &csv).with_context(|| format!("Failed to write {}", path.display()))?;

    let result = ExportOutput {
        kind: args.collection.kind(),
        path: path.display().to_string(),
        records,
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}\t{}\t{}", r.kind, r.records, r.path),
        |r, w| {
            pretty_kv(w, "Exported", format!("{} {}(s)", r.records, r.kind))?;
            pretty_kv(w, "File", &r.path)
        },
    )
}
