//! `csm task`: task CRUD, completion toggle, and filtered listing.

use crate::cmd::{delete_record, open_session};
use crate::output::{OutputMode, TaskDetail, TaskRow, render_item, render_list, render_mode};
use anyhow::Result;
use clap::{Args, Subcommand};
use csm_core::model::{RecordKind, TaskInput, TaskType};
use csm_core::query::TaskQuery;
use csm_core::{CsmError, Session};
use serde::Serialize;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a task. New tasks always start incomplete.
    Add(TaskAddArgs),
    /// Replace fields on an existing task.
    Update(TaskUpdateArgs),
    /// Flip a task between complete and incomplete.
    Toggle {
        /// Task ID.
        id: i64,
    },
    /// Delete a task. Unknown ids are a no-op.
    Delete {
        /// Task ID.
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        force: bool,
    },
    /// List tasks, optionally filtered by name and type.
    List(TaskListArgs),
    /// Show one task.
    Show {
        /// Task ID.
        id: i64,
    },
}

#[derive(Args, Debug)]
pub struct TaskAddArgs {
    /// Task name.
    pub name: String,

    /// Category: Risk, Upsell, Story, or EBC.
    #[arg(short = 't', long = "type")]
    pub task_type: String,

    /// Due date (YYYY-MM-DD).
    #[arg(short, long)]
    pub due: Option<String>,

    /// ID of the account this task belongs to.
    #[arg(short, long)]
    pub account: Option<i64>,
}

#[derive(Args, Debug)]
pub struct TaskUpdateArgs {
    /// Task ID.
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    /// Category: Risk, Upsell, Story, or EBC.
    #[arg(short = 't', long = "type")]
    pub task_type: Option<String>,

    /// Due date (YYYY-MM-DD).
    #[arg(short, long, conflicts_with = "clear_due")]
    pub due: Option<String>,

    /// Remove the due date.
    #[arg(long)]
    pub clear_due: bool,

    /// Account ID. Re-snapshots the account name.
    #[arg(short, long, conflicts_with = "clear_account")]
    pub account: Option<i64>,

    /// Detach the task from its account.
    #[arg(long)]
    pub clear_account: bool,

    /// Set completion explicitly (true/false).
    #[arg(long)]
    pub completed: Option<bool>,
}

impl TaskUpdateArgs {
    fn apply(&self, mut input: TaskInput) -> TaskInput {
        if let Some(name) = &self.name {
            input.name.clone_from(name);
        }
        if let Some(task_type) = &self.task_type {
            input.task_type.clone_from(task_type);
        }
        if self.clear_due {
            input.due = None;
        } else if self.due.is_some() {
            input.due.clone_from(&self.due);
        }
        if self.clear_account {
            input.account_id = None;
        } else if self.account.is_some() {
            input.account_id = self.account;
        }
        if let Some(completed) = self.completed {
            input.completed = completed;
        }
        input
    }
}

#[derive(Args, Debug, Default)]
pub struct TaskListArgs {
    /// Case-insensitive substring of the task name.
    #[arg(short, long)]
    pub search: Option<String>,

    /// Only tasks of this category.
    #[arg(short = 't', long = "type")]
    pub task_type: Option<String>,
}

impl TaskListArgs {
    fn query(&self) -> Result<TaskQuery, CsmError> {
        let task_type = self
            .task_type
            .as_deref()
            .map(str::parse::<TaskType>)
            .transpose()?;
        Ok(TaskQuery::new(
            self.search.as_deref().unwrap_or_default(),
            task_type,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteOutput {
    pub kind: RecordKind,
    pub id: i64,
    pub deleted: bool,
}

pub fn render_delete(output: OutputMode, result: &DeleteOutput) -> Result<()> {
    render_mode(
        output,
        result,
        |r, w| writeln!(w, "{}\t{}\t{}", r.kind, r.id, r.deleted),
        |r, w| {
            if r.deleted {
                writeln!(w, "Deleted {} #{}", r.kind, r.id)
            } else {
                writeln!(w, "No {} #{}; nothing deleted", r.kind, r.id)
            }
        },
    )
}

fn require_task(session: &mut Session, id: i64) -> Result<csm_core::model::Task> {
    session.get_task(id)?.ok_or_else(|| {
        CsmError::NotFound {
            kind: RecordKind::Task,
            id,
        }
        .into()
    })
}

/// Execute a `csm task` subcommand.
///
/// # Errors
///
/// Returns an error if the project cannot be opened, input is invalid,
/// the task does not exist (for show/update/toggle), or the store fails.
pub fn run_task(command: &TaskCommand, output: OutputMode, project_root: &Path) -> Result<()> {
    let mut session = open_session(project_root)?;

    match command {
        TaskCommand::Add(args) => {
            let mut input = TaskInput::new(&args.name, &args.task_type);
            input.due.clone_from(&args.due);
            input.account_id = args.account;
            let task = session.add_task(&input)?;
            render_item(&TaskDetail(&task), output)?;
        }
        TaskCommand::Update(args) => {
            let current = require_task(&mut session, args.id)?;
            let input = args.apply(TaskInput::from(&current));
            let task = session.update_task(args.id, &input)?;
            render_item(&TaskDetail(&task), output)?;
        }
        TaskCommand::Toggle { id } => {
            let task = session.toggle_task(*id)?;
            render_item(&TaskRow(&task), output)?;
        }
        TaskCommand::Delete { id, force } => {
            let lookup = session.get_task(*id);
            let deleted = delete_record(
                lookup,
                RecordKind::Task,
                *id,
                *force,
                |task| format!("task #{id} '{}'", task.name),
                || session.delete_task(*id),
            )?;
            render_delete(
                output,
                &DeleteOutput {
                    kind: RecordKind::Task,
                    id: *id,
                    deleted,
                },
            )?;
        }
        TaskCommand::List(args) => {
            let tasks = session.search(&args.query()?)?;
            if tasks.is_empty() && output == OutputMode::Pretty {
                println!("No tasks found.");
                return Ok(());
            }
            let rows: Vec<_> = tasks.iter().map(TaskRow).collect();
            render_list(&rows, output)?;
        }
        TaskCommand::Show { id } => {
            let task = require_task(&mut session, *id)?;
            render_item(&TaskDetail(&task), output)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(subcommand)]
        command: TaskCommand,
    }

    fn parse(args: &[&str]) -> TaskCommand {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        Wrapper::parse_from(argv).command
    }

    #[test]
    fn update_merges_only_given_fields() {
        let TaskCommand::Update(args) = parse(&["update", "4", "--name", "Renamed", "--clear-due"])
        else {
            panic!("expected update");
        };
        let current = TaskInput::new("Old", "Risk")
            .due("2026-01-01")
            .account(2)
            .completed(true);
        let merged = args.apply(current);
        assert_eq!(merged.name, "Renamed");
        assert_eq!(merged.task_type, "Risk");
        assert_eq!(merged.due, None);
        assert_eq!(merged.account_id, Some(2));
        assert!(merged.completed);
    }

    #[test]
    fn due_and_clear_due_conflict() {
        assert!(
            Wrapper::try_parse_from(["test", "update", "1", "--due", "2026-01-01", "--clear-due"])
                .is_err()
        );
    }

    #[test]
    fn list_query_parses_type_case_insensitively() {
        let args = TaskListArgs {
            search: Some("Renewal".into()),
            task_type: Some("ebc".into()),
        };
        let query = args.query().expect("valid");
        assert_eq!(query.task_type, Some(TaskType::Ebc));
        assert_eq!(query.text(), "renewal");

        let bad = TaskListArgs {
            search: None,
            task_type: Some("meeting".into()),
        };
        assert!(matches!(bad.query(), Err(CsmError::InvalidEnum { .. })));
    }

    #[test]
    fn empty_list_args_match_everything() {
        assert_eq!(
            TaskListArgs::default().query().expect("valid"),
            TaskQuery::default()
        );
    }

    #[test]
    fn delete_removes_rows_that_no_longer_decode() {
        let dir = tempfile::tempdir().expect("temp dir");
        crate::cmd::init::run_init(
            &crate::cmd::init::InitArgs { force: false },
            OutputMode::Json,
            true,
            dir.path(),
        )
        .expect("init");

        let mut session = open_session(dir.path()).expect("session");
        let id = session
            .add_task(&TaskInput::new("Exec sync", "EBC"))
            .expect("add")
            .id
            .expect("id");
        session
            .store()
            .expect("store")
            .conn()
            .execute_batch("UPDATE csm_tasks SET type = 'Meeting'")
            .expect("corrupt row");
        assert!(matches!(session.get_task(id), Err(CsmError::Parse(_))));
        drop(session);

        run_task(
            &TaskCommand::Delete { id, force: true },
            OutputMode::Json,
            dir.path(),
        )
        .expect("delete unreadable task");

        let mut session = open_session(dir.path()).expect("session");
        assert!(session.get_task(id).expect("lookup").is_none());
    }
}
