use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use csm_core::Session;
use csm_core::config::{self, CONFIG_FILE, CSM_DIR, DB_FILE};
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Discard an existing record store and create an empty one.
    /// An existing config.toml is kept.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[storage]\n\
    # Table names for each record kind. Changing them on an existing\n\
    # store is refused; run `csm init --force` to start over.\n\
    task_key = \"csm_tasks\"\n\
    account_key = \"csm_accounts\"\n";

const GITIGNORE: &str = "csm.sqlite3\ncsm.sqlite3-wal\ncsm.sqlite3-shm\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    path: String,
    db_path: String,
    task_key: String,
    account_key: String,
    reinitialized: bool,
}

/// Execute `csm init`. Creates the project skeleton:
///
/// ```text
/// .csm/
///   config.toml   (storage keys)
///   .gitignore    (the sqlite files)
///   csm.sqlite3   (empty, migrated store)
/// ```
///
/// # Errors
///
/// Returns an error if `.csm/` already exists and `--force` is not set,
/// or if any filesystem or store operation fails.
pub fn run_init(
    args: &InitArgs,
    output: OutputMode,
    quiet: bool,
    project_root: &Path,
) -> Result<()> {
    let csm_dir = project_root.join(CSM_DIR);
    let existed = csm_dir.exists();

    if existed && !args.force {
        anyhow::bail!(".csm/ already exists. Use `csm init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&csm_dir)
        .with_context(|| format!("Failed to create {}", csm_dir.display()))?;

    let config_path = csm_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        std::fs::write(&config_path, CONFIG_TOML)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }
    let gitignore = csm_dir.join(".gitignore");
    if !gitignore.exists() {
        std::fs::write(&gitignore, GITIGNORE)
            .with_context(|| format!("Failed to write {}", gitignore.display()))?;
    }

    if existed {
        for suffix in ["", "-wal", "-shm"] {
            let file = csm_dir.join(format!("{DB_FILE}{suffix}"));
            if file.exists() {
                std::fs::remove_file(&file)
                    .with_context(|| format!("Failed to remove {}", file.display()))?;
            }
        }
        info!(dir = %csm_dir.display(), "discarded existing record store");
    }

    let effective = config::resolve_config(&csm_dir)?;
    let mut session = Session::from_config(&effective);
    session.store()?;

    let result = InitOutput {
        path: csm_dir.display().to_string(),
        db_path: effective.db_path.display().to_string(),
        task_key: effective.keys.tasks().to_string(),
        account_key: effective.keys.accounts().to_string(),
        reinitialized: existed,
    };

    if quiet && !output.is_json() {
        return Ok(());
    }
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}\t{}\t{}", r.path, r.task_key, r.account_key),
        |r, w| {
            pretty_section(w, "Initialized csm project")?;
            pretty_kv(w, "Directory", &r.path)?;
            pretty_kv(w, "Store", &r.db_path)?;
            pretty_kv(w, "Task key", &r.task_key)?;
            pretty_kv(w, "Account key", &r.account_key)?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  csm account add \"Acme\" --vertical FINS")?;
            writeln!(w, "  csm task add \"Kickoff call\" --type Story --account 1")?;
            writeln!(w, "  csm okr show")
        },
    )
}
