//! `csm import`: load records from CSV.

use crate::cmd::export::Collection;
use crate::cmd::open_session;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use csm_core::transfer::{self, ImportReport};
use std::io::Read as _;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Records to import.
    #[arg(value_enum)]
    pub collection: Collection,

    /// CSV file to read, or `-` for stdin.
    pub path: PathBuf,
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read CSV from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// List skipped-row reasons under a heading.
pub fn write_warnings(w: &mut dyn std::io::Write, warnings: &[String]) -> std::io::Result<()> {
    if warnings.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    writeln!(w, "Warnings:")?;
    for warning in warnings {
        writeln!(w, "  - {warning}")?;
    }
    Ok(())
}

/// Execute `csm import`.
///
/// Rows that fail validation are skipped and reported; the rest are written
/// in one transaction.
///
/// # Errors
///
/// Returns an error if the project cannot be opened, the file cannot be
/// read, the header row is unusable, or the store fails.
pub fn run_import(args: &ImportArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let input = read_input(&args.path)?;
    let mut session = open_session(project_root)?;

    let report = match args.collection {
        Collection::Tasks => transfer::import_tasks(&mut session, &input)?,
        Collection::Accounts => transfer::import_accounts(&mut session, &input)?,
    };

    let kind = args.collection.kind();
    render_mode(
        output,
        &report,
        |r: &ImportReport, w| writeln!(w, "{kind}\t{}\t{}", r.imported, r.skipped),
        |r: &ImportReport, w| {
            pretty_section(w, &format!("Imported {kind}s"))?;
            pretty_kv(w, "Imported", r.imported.to_string())?;
            pretty_kv(w, "Skipped", r.skipped.to_string())?;
            write_warnings(w, &r.warnings)
        },
    )
}
