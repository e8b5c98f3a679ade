//! Subcommand handlers. Each module owns its clap args and a `run_*` entry point.

pub mod account;
pub mod completions;
pub mod export;
pub mod import;
pub mod init;
pub mod migrate;
pub mod okr;
pub mod task;

use crate::output::CliError;
use csm_core::config::{self, EffectiveConfig};
use csm_core::model::RecordKind;
use csm_core::{CsmError, ErrorCode, Session};
use std::io::{IsTerminal, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Locate the enclosing `.csm/` directory and load its effective config.
pub fn load_project(project_root: &Path) -> anyhow::Result<EffectiveConfig> {
    let csm_dir = config::find_csm_dir(project_root)
        .ok_or_else(|| CsmError::NotInitialized(project_root.to_path_buf()))?;
    debug!(dir = %csm_dir.display(), "using project");

    config::resolve_config(&csm_dir).map_err(|e| {
        let code = ErrorCode::ConfigParseError;
        CliError::with_details(
            format!("{e:#}"),
            code.hint().unwrap_or(code.message()),
            code.code(),
        )
        .into()
    })
}

/// Open a session on the project enclosing `project_root`.
pub fn open_session(project_root: &Path) -> anyhow::Result<Session> {
    let config = load_project(project_root)?;
    let session = Session::from_config(&config);
    debug!(
        db = %session.db_path().display(),
        tasks = session.keys().tasks(),
        accounts = session.keys().accounts(),
        "opening session"
    );
    Ok(session)
}

/// Ask for confirmation on an interactive terminal. Scripts are never prompted.
pub fn confirm_delete(what: &str) -> anyhow::Result<bool> {
    if !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal() {
        return Ok(true);
    }

    eprint!("Delete {what}? [y/N] ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let answer = input.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Confirm and run a delete by id, given the result of looking the record up.
///
/// A missing record deletes nothing. A row that no longer decodes is still
/// deleted, described by kind and id alone.
pub fn delete_record<T>(
    lookup: csm_core::Result<Option<T>>,
    kind: RecordKind,
    id: i64,
    force: bool,
    describe: impl FnOnce(&T) -> String,
    delete: impl FnOnce() -> csm_core::Result<bool>,
) -> anyhow::Result<bool> {
    let what = match lookup {
        Ok(Some(record)) => describe(&record),
        Ok(None) => return Ok(false),
        Err(CsmError::Parse(reason)) => {
            warn!(%kind, id, %reason, "deleting unreadable record");
            format!("unreadable {kind} #{id}")
        }
        Err(e) => return Err(e.into()),
    };
    if !force && !confirm_delete(&what)? {
        anyhow::bail!("delete cancelled");
    }
    Ok(delete()?)
}
