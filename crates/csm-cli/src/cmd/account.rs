//! `csm account`: account CRUD and the vertical reference table.

use crate::cmd::task::{DeleteOutput, render_delete};
use crate::cmd::{delete_record, open_session};
use crate::output::{AccountDetail, AccountRow, OutputMode, render_item, render_list, render_mode};
use anyhow::Result;
use clap::{Args, Subcommand};
use csm_core::CsmError;
use csm_core::model::{AccountInput, RecordKind, Vertical};
use serde::Serialize;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Add an account.
    Add(AccountAddArgs),
    /// Replace fields on an existing account. Task snapshots keep the old name.
    Update(AccountUpdateArgs),
    /// Delete an account. Tasks referencing it are left untouched.
    Delete {
        /// Account ID.
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        force: bool,
    },
    /// List all accounts.
    List,
    /// Show one account.
    Show {
        /// Account ID.
        id: i64,
    },
    /// List the allowed verticals and their sub-verticals.
    Verticals,
}

#[derive(Args, Debug)]
pub struct AccountAddArgs {
    /// Account name.
    pub name: String,

    /// Industry vertical, e.g. FINS or "Public Sector".
    #[arg(long)]
    pub vertical: Option<String>,

    /// Sub-vertical within the vertical.
    #[arg(long, requires = "vertical")]
    pub sub_vertical: Option<String>,

    /// Annual recurring revenue. `$` and `,` are ignored.
    #[arg(long)]
    pub arr: Option<String>,

    /// Renewal date (YYYY-MM-DD).
    #[arg(long)]
    pub renewal: Option<String>,
}

#[derive(Args, Debug)]
pub struct AccountUpdateArgs {
    /// Account ID.
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    /// New vertical. Clears the sub-vertical unless one is given too.
    #[arg(long, conflicts_with = "clear_vertical")]
    pub vertical: Option<String>,

    #[arg(long, conflicts_with = "clear_vertical")]
    pub sub_vertical: Option<String>,

    /// Remove vertical and sub-vertical.
    #[arg(long)]
    pub clear_vertical: bool,

    #[arg(long, conflicts_with = "clear_arr")]
    pub arr: Option<String>,

    #[arg(long)]
    pub clear_arr: bool,

    #[arg(long, conflicts_with = "clear_renewal")]
    pub renewal: Option<String>,

    #[arg(long)]
    pub clear_renewal: bool,
}

impl AccountUpdateArgs {
    fn apply(&self, mut input: AccountInput) -> AccountInput {
        if let Some(name) = &self.name {
            input.name.clone_from(name);
        }
        if self.clear_vertical {
            input.vertical = None;
            input.sub_vertical = None;
        } else if self.vertical.is_some() {
            input.vertical.clone_from(&self.vertical);
            input.sub_vertical.clone_from(&self.sub_vertical);
        } else if self.sub_vertical.is_some() {
            input.sub_vertical.clone_from(&self.sub_vertical);
        }
        if self.clear_arr {
            input.arr = None;
        } else if self.arr.is_some() {
            input.arr.clone_from(&self.arr);
        }
        if self.clear_renewal {
            input.renewal_date = None;
        } else if self.renewal.is_some() {
            input.renewal_date.clone_from(&self.renewal);
        }
        input
    }
}

#[derive(Debug, Serialize)]
struct VerticalEntry {
    vertical: Vertical,
    sub_verticals: &'static [&'static str],
}

fn render_verticals(output: OutputMode) -> Result<()> {
    let entries: Vec<VerticalEntry> = Vertical::ALL
        .iter()
        .map(|&vertical| VerticalEntry {
            vertical,
            sub_verticals: vertical.sub_verticals(),
        })
        .collect();
    render_mode(
        output,
        &entries,
        |entries, w| {
            for e in entries {
                writeln!(w, "{}\t{}", e.vertical, e.sub_verticals.join(","))?;
            }
            Ok(())
        },
        |entries, w| {
            for e in entries {
                writeln!(w, "{}", e.vertical)?;
                for sub in e.sub_verticals {
                    writeln!(w, "  - {sub}")?;
                }
            }
            Ok(())
        },
    )
}

/// Execute a `csm account` subcommand.
///
/// # Errors
///
/// Returns an error if the project cannot be opened, input is invalid,
/// the account does not exist (for show/update), or the store fails.
pub fn run_account(
    command: &AccountCommand,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    if matches!(command, AccountCommand::Verticals) {
        return render_verticals(output);
    }

    let mut session = open_session(project_root)?;
    let not_found = |id| CsmError::NotFound {
        kind: RecordKind::Account,
        id,
    };

    match command {
        AccountCommand::Add(args) => {
            let input = AccountInput {
                name: args.name.clone(),
                vertical: args.vertical.clone(),
                sub_vertical: args.sub_vertical.clone(),
                arr: args.arr.clone(),
                renewal_date: args.renewal.clone(),
            };
            let account = session.add_account(&input)?;
            render_item(&AccountDetail(&account), output)?;
        }
        AccountCommand::Update(args) => {
            let current = session
                .get_account(args.id)?
                .ok_or_else(|| not_found(args.id))?;
            let input = args.apply(AccountInput::from(&current));
            let account = session.update_account(args.id, &input)?;
            render_item(&AccountDetail(&account), output)?;
        }
        AccountCommand::Delete { id, force } => {
            let lookup = session.get_account(*id);
            let deleted = delete_record(
                lookup,
                RecordKind::Account,
                *id,
                *force,
                |account| format!("account #{id} '{}'", account.name),
                || session.delete_account(*id),
            )?;
            render_delete(
                output,
                &DeleteOutput {
                    kind: RecordKind::Account,
                    id: *id,
                    deleted,
                },
            )?;
        }
        AccountCommand::List => {
            let accounts = session.list_accounts()?;
            if accounts.is_empty() && output == OutputMode::Pretty {
                println!("No accounts found.");
                return Ok(());
            }
            let rows: Vec<_> = accounts.iter().map(AccountRow).collect();
            render_list(&rows, output)?;
        }
        AccountCommand::Show { id } => {
            let account = session.get_account(*id)?.ok_or_else(|| not_found(*id))?;
            render_item(&AccountDetail(&account), output)?;
        }
        AccountCommand::Verticals => {}
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
        command: AccountCommand,
    }

    fn update_args(args: &[&str]) -> AccountUpdateArgs {
        let mut argv = vec!["test", "update", "1"];
        argv.extend_from_slice(args);
        match Wrapper::parse_from(argv).command {
            AccountCommand::Update(args) => args,
            other => panic!("expected update, got {other:?}"),
        }
    }

    fn acme() -> AccountInput {
        AccountInput::new("Acme")
            .vertical("FINS", Some("Banking"))
            .arr("1000")
            .renewal_date("2027-01-31")
    }

    #[test]
    fn new_vertical_drops_stale_sub_vertical() {
        let merged = update_args(&["--vertical", "Retail"]).apply(acme());
        assert_eq!(merged.vertical.as_deref(), Some("Retail"));
        assert_eq!(merged.sub_vertical, None);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn clear_flags_remove_optional_fields() {
        let merged =
            update_args(&["--clear-vertical", "--clear-arr", "--clear-renewal"]).apply(acme());
        let account = merged.validate().expect("valid");
        assert_eq!(account.vertical, None);
        assert_eq!(account.sub_vertical, None);
        assert_eq!(account.arr, None);
        assert_eq!(account.renewal_date, None);
    }

    #[test]
    fn untouched_fields_survive() {
        let merged = update_args(&["--name", "Acme Corp"]).apply(acme());
        let account = merged.validate().expect("valid");
        assert_eq!(account.name, "Acme Corp");
        assert_eq!(account.sub_vertical.as_deref(), Some("Banking"));
        assert!(account.arr.is_some_and(|arr| (arr - 1000.0).abs() < f64::EPSILON));
    }

    #[test]
    fn sub_vertical_on_add_needs_vertical() {
        assert!(Wrapper::try_parse_from(["test", "add", "Acme", "--sub-vertical", "Banking"]).is_err());
    }
}
