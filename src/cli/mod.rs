//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for list/query commands.
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// JSON (same as --json)
    Json,
}

pub mod commands;

/// contactsync - keep a local address book in step with its provider
#[derive(Parser, Debug)]
#[command(name = "csync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.contactsync/data/contacts.db)
    #[arg(long, global = true, env = "CSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (table, json)
    #[arg(long, value_enum, global = true, default_value_t)]
    pub format: OutputFormat,

    /// Preview changes without writing to the database
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local contact database
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Mirror the provider into the local database
    Sync {
        /// Provider snapshot file (JSON)
        #[arg(long, env = "CONTACTSYNC_SNAPSHOT")]
        snapshot: Option<PathBuf>,
    },

    /// Group commands
    Groups {
        #[command(subcommand)]
        command: GroupCommands,
    },

    /// Contact commands
    Contacts {
        #[command(subcommand)]
        command: ContactCommands,
    },

    /// List likely duplicate contacts
    Duplicates,

    /// Merge contacts into one
    Merge {
        /// Contact ids to merge (at least two)
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,

        /// Contact that survives the merge (default: the first id)
        #[arg(long)]
        target: Option<i64>,
    },

    /// Re-attach favorites and groups staged by a schema upgrade
    Restore,

    /// Show database status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    /// List groups with member counts
    List,

    /// Deduplicate and mirror provider groups only
    Sync {
        /// Provider snapshot file (JSON)
        #[arg(long, env = "CONTACTSYNC_SNAPSHOT")]
        snapshot: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ContactCommands {
    /// List contacts
    List {
        /// Only favorites
        #[arg(long)]
        favorites: bool,

        /// Only members of this group
        #[arg(long)]
        group: Option<i64>,
    },

    /// Show one contact
    Show {
        /// Contact id
        id: i64,
    },

    /// Mark or unmark a contact as favorite
    Favorite {
        /// Contact id
        id: i64,

        /// Clear the favorite flag instead
        #[arg(long)]
        off: bool,
    },
}
