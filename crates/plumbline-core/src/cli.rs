use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::{CategoryFilter, DateFilter, GroupBy, PriorityFilter, StatusFilter, TaskQuery};
use crate::prefs::ViewDensity;
use crate::task::{Category, Priority, Recurrence};

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "plumbline",
    version,
    about = "Plumbline: job checklist for a plumbing service office"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rc-file", global = true)]
    pub rc_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the checklist (the default).
    List(ListArgs),
    /// Add a task.
    Add(AddArgs),
    /// Change fields of a task; omitted flags are left alone.
    Edit(EditArgs),
    /// Mark a task done, or reopen it.
    Toggle { task: String },
    /// Delete a task permanently.
    Delete { task: String },
    /// Move a task within its group on the current page.
    Move(MoveArgs),
    /// Totals, overdue count and completion rate.
    Stats,
    /// Show or change saved view preferences.
    Prefs(PrefsArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(short = 's', long, default_value = "")]
    pub search: String,

    #[arg(long, default_value = "all")]
    pub priority: PriorityFilter,

    #[arg(long, default_value = "all")]
    pub category: CategoryFilter,

    #[arg(long, default_value = "all")]
    pub date: DateFilter,

    #[arg(long, default_value = "all")]
    pub status: StatusFilter,

    /// Grouping for this and later listings.
    #[arg(short = 'g', long)]
    pub group: Option<GroupBy>,

    #[arg(short = 'p', long, default_value_t = 1)]
    pub page: usize,

    /// Page size for this and later listings.
    #[arg(long)]
    pub per_page: Option<usize>,

    /// Expand the completed section.
    #[arg(long)]
    pub show_completed: bool,
}

impl ListArgs {
    pub fn query(&self) -> TaskQuery {
        TaskQuery {
            search: self.search.clone(),
            priority: self.priority,
            category: self.category,
            date: self.date,
            status: self.status,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true, trailing_var_arg = true)]
    pub text: Vec<String>,

    #[arg(long)]
    pub priority: Option<Priority>,

    /// A fixed category, or custom:<label>.
    #[arg(long)]
    pub category: Option<Category>,

    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub reminder: Option<String>,

    #[arg(long)]
    pub repeat: Option<Recurrence>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub task: String,

    #[arg(long)]
    pub text: Option<String>,

    #[arg(long)]
    pub priority: Option<Priority>,

    #[arg(long)]
    pub category: Option<Category>,

    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,

    #[arg(long)]
    pub clear_due: bool,

    #[arg(long, conflicts_with = "clear_reminder")]
    pub reminder: Option<String>,

    #[arg(long)]
    pub clear_reminder: bool,

    #[arg(long)]
    pub repeat: Option<Recurrence>,
}

#[derive(Args, Debug, Clone)]
pub struct MoveArgs {
    pub task: String,

    /// 0-based position within the task's group.
    pub to: usize,

    #[command(flatten)]
    pub view: ListArgs,
}

#[derive(Args, Debug, Clone)]
pub struct PrefsArgs {
    #[arg(long)]
    pub group: Option<GroupBy>,

    #[arg(long)]
    pub density: Option<ViewDensity>,

    #[arg(long)]
    pub per_page: Option<usize>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
