use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "margin")]
#[command(about = "Keep a local copy of your notes in sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory used as the remote note service
    #[arg(long, global = true, value_name = "DIR")]
    pub remote: Option<PathBuf>,

    /// Ingestion worker count (overrides the saved setting)
    #[arg(long, global = true, value_name = "N")]
    pub workers: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a directory of .note documents
    Import {
        /// Directory holding the documents
        dir: PathBuf,
    },
    /// List recent notes
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Include notebook templates
        #[arg(long)]
        templates: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search notes; every word must match
    Search {
        /// Search query
        query: String,
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single note
    Show {
        /// Note guid or unique guid prefix
        guid: String,
        /// Print the raw note-content markup (included in the JSON with --json)
        #[arg(long)]
        xml: bool,
        /// Output the note's metadata as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note title
        title: String,
        /// Note body (read from stdin when omitted)
        body: Vec<String>,
    },
    /// Edit the body of a note in $EDITOR
    Edit {
        /// Note guid or unique guid prefix
        guid: String,
    },
    /// Delete a note (removed everywhere at the next sync)
    Delete {
        /// Note guid or unique guid prefix
        guid: String,
    },
    /// Remove deleted notes locally without syncing
    Purge,
    /// Run a sync round against the remote
    Sync {
        /// Resolve every conflict the same way instead of asking
        #[arg(long, value_enum)]
        prefer: Option<Preference>,
        /// Output the round report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change sync settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Preference {
    Local,
    Remote,
    Defer,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update settings
    Set {
        /// Ingestion worker count
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        /// Whether templates appear in listings
        #[arg(long, value_name = "BOOL")]
        include_templates: Option<bool>,
        /// Forget the last sync date; the next round treats every change as new
        #[arg(long)]
        reset_sync_date: bool,
    },
}
