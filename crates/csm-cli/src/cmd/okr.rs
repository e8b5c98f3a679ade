//! `csm okr`: per-category progress against targets.

use crate::cmd::open_session;
use crate::output::{OkrRow, OutputMode, pretty_section, render_list};
use anyhow::Result;
use clap::Subcommand;
use csm_core::model::TaskType;
use csm_core::okr::OkrProgress;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum OkrCommand {
    /// Show progress for every category.
    Show,
    /// Set the target count for one category.
    SetTarget {
        /// Category: Risk, Upsell, Story, or EBC.
        task_type: String,
        /// Number of completed tasks that counts as 100%.
        target: u32,
    },
}

fn render_progress(progress: &[OkrProgress], output: OutputMode) -> Result<()> {
    if output == OutputMode::Pretty {
        pretty_section(&mut std::io::stdout().lock(), "OKR progress")?;
    }
    let rows: Vec<_> = progress.iter().map(OkrRow).collect();
    render_list(&rows, output)?;
    Ok(())
}

/// Execute a `csm okr` subcommand.
///
/// # Errors
///
/// Returns an error if the project cannot be opened, the category or target
/// is invalid, or the store fails.
pub fn run_okr(command: &OkrCommand, output: OutputMode, project_root: &Path) -> Result<()> {
    let mut session = open_session(project_root)?;
    let progress = match command {
        OkrCommand::Show => session.okr_progress()?,
        OkrCommand::SetTarget { task_type, target } => {
            let task_type: TaskType = task_type.parse()?;
            let tasks = session.list_tasks()?;
            session.set_okr_target(task_type, *target, &tasks)?
        }
    };
    render_progress(&progress, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(subcommand)]
        command: OkrCommand,
    }

    #[test]
    fn set_target_takes_type_and_count() {
        let cmd = Wrapper::parse_from(["test", "set-target", "Upsell", "6"]).command;
        assert!(matches!(
            cmd,
            OkrCommand::SetTarget { ref task_type, target: 6 } if task_type == "Upsell"
        ));
    }

    #[test]
    fn negative_target_is_rejected_by_the_parser() {
        assert!(Wrapper::try_parse_from(["test", "set-target", "Risk", "-1"]).is_err());
    }
}
