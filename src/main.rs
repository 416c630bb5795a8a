//! # Taskloop
//!
//! A terminal task manager built around recurring tasks. A repeating task is a
//! single entry whose next occurrence moves forward each time it is completed;
//! until that occurrence arrives the task stays out of the default list.
//!
//! ## Usage
//!
//! ```bash
//! # Basic task
//! taskloop add "Write report" --project Work --due 2026-12-01
//!
//! # Every Monday and Thursday
//! taskloop add "Team standup" --recur weekly --on mon,thu
//!
//! # 15th of every other month, until the end of next year
//! taskloop add "Pay invoice" --recur monthly --interval 2 --day-of-month 15 --until 2027-12-31
//!
//! # Due tasks, or everything
//! taskloop list
//! taskloop list --all
//!
//! # Complete a task (recurring tasks advance to their next occurrence)
//! taskloop complete <ID>
//!
//! # Preview the next five occurrences
//! taskloop next <ID> --count 5
//! ```
//!
//! ## Configuration
//!
//! * `TASKLOOP_DB`: path of the JSON task file. Defaults to
//!   `taskloop/tasks.json` in the platform's local data directory.
//! * `RUST_LOG`: log filter, `warn` by default.

use std::io;
use std::process::ExitCode;

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

use taskloop::commands::*;

#[derive(Parser)]
#[command(name = "taskloop")]
#[command(about = "Terminal task manager with recurring tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task name (quoted if it has spaces)
        name: String,
        /// Project or section
        #[arg(short, long)]
        project: Option<String>,
        /// Longer description
        #[arg(short = 'D', long)]
        description: Option<String>,
        /// Due date in YYYY-MM-DD or RFC 3339
        #[arg(short, long)]
        due: Option<String>,
        #[command(flatten)]
        rule: RuleArgs,
    },
    /// List tasks that are due now
    List {
        /// Also show upcoming and completed tasks
        #[arg(short, long)]
        all: bool,
    },
    /// Mark a task as complete
    Complete { id: u64 },
    /// Reopen a completed task
    Restore { id: u64 },
    /// Remove a task
    Remove { id: u64 },
    /// Edit a task
    Edit {
        id: u64,
        /// New task name
        #[arg(short, long)]
        name: Option<String>,
        /// New project
        #[arg(short, long)]
        project: Option<String>,
        /// New description
        #[arg(short = 'D', long)]
        description: Option<String>,
        /// New due date
        #[arg(short, long)]
        due: Option<String>,
        #[command(flatten)]
        rule: RuleArgs,
        /// Stop repeating the task
        #[arg(long, conflicts_with = "recur")]
        no_recur: bool,
    },
    /// Show upcoming occurrences of a recurring task
    Next {
        id: u64,
        /// Number of occurrences to show
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },
    /// Reset the database (delete all tasks)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn run(command: Option<Commands>) -> taskloop::Result<()> {
    let now = Utc::now();
    match command {
        Some(Commands::Add { name, project, description, due, rule }) => {
            cmd_add(name, project, description, due, &rule, now, false).map(|_| ())
        }
        Some(Commands::List { all }) => cmd_list(all, now).map(|_| ()),
        Some(Commands::Complete { id }) => cmd_complete(id, now, false).map(|_| ()),
        Some(Commands::Restore { id }) => cmd_restore(id, false).map(|_| ()),
        Some(Commands::Remove { id }) => cmd_remove(id, false),
        Some(Commands::Edit { id, name, project, description, due, rule, no_recur }) => {
            let edit = TaskEdit { name, project, description, due, rule, no_recur };
            cmd_edit(id, edit, now, false).map(|_| ())
        }
        Some(Commands::Next { id, count }) => cmd_next(id, count, now, false).map(|_| ()),
        Some(Commands::Reset { force }) => cmd_reset(force),
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "taskloop", &mut io::stdout());
            Ok(())
        }
        None => cmd_list(false, now).map(|_| ()),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
