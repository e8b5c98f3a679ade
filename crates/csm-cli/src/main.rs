#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use csm_core::{CsmError, config, timing};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "csm: customer-success task and account tracker",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit command timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output (shorthand for `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format: pretty, text, or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        let user_pref = match config::load_user_config() {
            Ok(user) => user.output,
            Err(e) => {
                warn!("ignoring user config: {e:#}");
                None
            }
        };
        resolve_output_mode(self.format, self.json, user_pref.as_deref())
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a csm project",
        long_about = "Create .csm/ in the current directory with a config file and an empty record store.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    csm init\n\n    # Throw away an existing store and start over\n    csm init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Records",
        about = "Manage tasks",
        long_about = "Add, update, toggle, delete, list, and show customer-success tasks.",
        after_help = "EXAMPLES:\n    # Add a risk task due next month for account 3\n    csm task add \"Renewal at risk\" --type Risk --due 2026-11-30 --account 3\n\n    # Mark task 7 done (or undone)\n    csm task toggle 7\n\n    # Find open upsell work\n    csm task list --type upsell --search expansion"
    )]
    Task {
        #[command(subcommand)]
        command: cmd::task::TaskCommand,
    },

    #[command(
        next_help_heading = "Records",
        about = "Manage accounts",
        long_about = "Add, update, delete, list, and show customer accounts.",
        after_help = "EXAMPLES:\n    # Add an account with a classification and ARR\n    csm account add \"Acme\" --vertical FINS --sub-vertical Banking --arr 250000\n\n    # Show the allowed verticals and sub-verticals\n    csm account verticals"
    )]
    Account {
        #[command(subcommand)]
        command: cmd::account::AccountCommand,
    },

    #[command(
        next_help_heading = "Reporting",
        about = "Show or adjust OKR progress",
        long_about = "Aggregate completed tasks per category against per-category targets.",
        after_help = "EXAMPLES:\n    # Show progress for every category\n    csm okr show\n\n    # Raise the upsell target to 6\n    csm okr set-target Upsell 6"
    )]
    Okr {
        #[command(subcommand)]
        command: cmd::okr::OkrCommand,
    },

    #[command(
        next_help_heading = "Interchange",
        about = "Export records as CSV",
        long_about = "Write every task or account as CSV, to stdout or a file.",
        after_help = "EXAMPLES:\n    # Export tasks to a file\n    csm export tasks --output tasks.csv\n\n    # Pipe accounts somewhere else\n    csm export accounts | less"
    )]
    Export(cmd::export::ExportArgs),

    #[command(
        next_help_heading = "Interchange",
        about = "Import records from CSV",
        long_about = "Read a CSV file produced by `csm export` (or by hand) and insert or update records.",
        after_help = "EXAMPLES:\n    # Import accounts first so task references resolve\n    csm import accounts accounts.csv\n    csm import tasks tasks.csv"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Upgrade the store and import legacy data",
        long_about = "Bring the record store to the latest schema and optionally import JSON blobs from the legacy browser tracker.",
        after_help = "EXAMPLES:\n    # Upgrade the store in place\n    csm migrate\n\n    # Pull in legacy data\n    csm migrate --legacy-tasks tasks.json --legacy-accounts accounts.json"
    )]
    Migrate(cmd::migrate::MigrateArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        long_about = "Generate shell completion scripts for bash, zsh, or fish.",
        after_help = "EXAMPLES:\n    # Generate zsh completions\n    csm completions zsh > ~/.zfunc/_csm"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CSM_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "csm=debug,csm_core=debug,info"
        } else {
            "csm=info,csm_core=info,warn"
        })
    });

    let format = env::var("CSM_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Init(args) => timing::timed("cmd.init", || {
            cmd::init::run_init(&args, output, quiet, &project_root)
        }),
        Commands::Task { command } => timing::timed("cmd.task", || {
            cmd::task::run_task(&command, output, &project_root)
        }),
        Commands::Account { command } => timing::timed("cmd.account", || {
            cmd::account::run_account(&command, output, &project_root)
        }),
        Commands::Okr { command } => timing::timed("cmd.okr", || {
            cmd::okr::run_okr(&command, output, &project_root)
        }),
        Commands::Export(args) => timing::timed("cmd.export", || {
            cmd::export::run_export(&args, output, &project_root)
        }),
        Commands::Import(args) => timing::timed("cmd.import", || {
            cmd::import::run_import(&args, output, &project_root)
        }),
        Commands::Migrate(args) => timing::timed("cmd.migrate", || {
            cmd::migrate::run_migrate(&args, output, &project_root)
        }),
        Commands::Completions(args) => timing::timed("cmd.completions", || {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }),
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let timing_enabled = cli.timing || timing::enabled_from_env();
    timing::set_enabled(timing_enabled);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = cli.output_mode();
    let result = run(cli, output);

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            if let Ok(json) = serde_json::to_string_pretty(&report) {
                eprintln!("timing report (json):");
                eprintln!("{json}");
            }
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if render_error(output, &CliError::from(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            exit_code(&err)
        }
    }
}

/// 2 for bad input, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<CsmError>() {
        Some(core) if core.is_user_error() => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
