use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "task-time-tracker")]
#[command(about = "Track time spent on named tasks", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start working on a task, stopping whatever is running
    Start {
        /// Task name (created on first use)
        name: String,
    },

    /// Stop the running session
    Stop,

    /// Show the running session
    Current,

    /// List time entries
    List {
        /// Time range shorthand (30m, 2h, 1d, 1w, 1mo, 1y); lists everything if omitted
        #[arg(short, long)]
        range: Option<String>,
    },

    /// Export time entries
    Output {
        /// Output format: json, csv, md
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Time range shorthand; exports everything if omitted
        #[arg(short, long)]
        range: Option<String>,

        /// Output file path
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Start a new session on an existing task
    Resume {
        /// Task ID
        id: i64,
    },

    /// Show everything recorded for a task
    Summary {
        /// Task ID
        id: i64,
    },

    /// Delete a task and all of its entries
    Delete {
        /// Task ID
        id: i64,
    },

    /// Show the current session, recent tasks and today's totals
    Dashboard {
        /// Time range shorthand for recent tasks
        #[arg(short, long)]
        range: Option<String>,
    },

    /// Show totals for a single day
    Today {
        /// Day to report (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Search tasks by name, range or id
    Search {
        /// Case-insensitive substring of the task name
        #[arg(short, long)]
        text: Option<String>,

        /// Time range shorthand
        #[arg(short, long)]
        range: Option<String>,

        /// Restrict to one task ID
        #[arg(long)]
        task: Option<i64>,

        /// Only tasks with a running session
        #[arg(long)]
        running: bool,

        /// Sort order: recent, oldest, name, duration
        #[arg(short, long, default_value = "recent")]
        sort: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Initialize default configuration
    Init,
    /// Open configuration file in editor
    Edit,
    /// Show current configuration
    Show,
}
