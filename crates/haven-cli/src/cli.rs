use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "haven")]
#[command(about = "Local-first productivity dashboard from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Remote server base URL; without it the engine stays offline and all
    /// mutations queue locally
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage task lists
    List {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Manage dashboard backgrounds
    Bg {
        #[command(subcommand)]
        command: BgCommands,
    },
    /// Manage site block rules
    Block {
        #[command(subcommand)]
        command: BlockCommands,
    },
    /// Sign in as a server account
    Login {
        /// Account user id
        user_id: String,
    },
    /// Sign out and discard queued work
    Logout,
    /// Show the active identity
    Whoami,
    /// Drain the queue and reconcile with the server
    Sync,
    /// Show pending sync operations
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Restore built-in defaults, removing custom records
    Reset,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a new task
    #[command(alias = "new")]
    Add {
        /// Task title
        title: Vec<String>,
        /// Target list name (defaults to the Inbox)
        #[arg(short, long, value_name = "NAME")]
        list: Option<String>,
        /// Optional category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List tasks
    List {
        /// Filter by category
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a task complete
    Done {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Delete a task
    Delete {
        /// Task ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// Create a new task list
    Add {
        /// List name
        name: String,
    },
    /// Show all task lists
    Show,
    /// Delete a list and its tasks
    Delete {
        /// List ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum BgCommands {
    /// Show available backgrounds
    List,
    /// Add a custom background
    Add {
        /// Display name
        name: String,
        /// Image URL
        url: String,
    },
    /// Delete a custom background
    Delete {
        /// Background ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum BlockCommands {
    /// Add a block rule (domain wildcard, e.g. "*.reddit.com")
    Add {
        /// Domain pattern
        pattern: String,
    },
    /// Show block rules
    List,
    /// Delete a block rule
    Delete {
        /// Rule ID or unique ID prefix
        id: String,
    },
    /// Check which rules would block a host
    Test {
        /// Host to check
        host: String,
    },
}
