//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;
pub mod shared;

/// threadsync - mirror a Graph API comment thread into SQLite
#[derive(Parser, Debug)]
#[command(name = "threadsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.threadsync/data/threadsync.db)
    #[arg(long, global = true, env = "THREADSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Numeric id of the thread to sync
    #[arg(long, global = true, env = "THREADSYNC_THREAD_ID")]
    pub thread: Option<String>,

    /// Graph API access token
    #[arg(long, global = true, env = "THREADSYNC_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

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
    /// Save token and thread to the settings file and create the database
    Init {
        /// Overwrite values already in the settings file
        #[arg(long)]
        force: bool,
    },

    /// Fetch the whole thread, newest page first, back to its first post
    Pull,

    /// Fetch posts newer than the most recently stored one
    Update {
        /// Refresh the participant roster as well
        #[arg(long)]
        participants: bool,
    },

    /// Refresh, store and print the participant roster
    Participants,

    /// Aggregate stored posts (authors, links)
    Report {
        /// Report to run: authors | links
        kind: String,

        /// Maximum rows to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show what is stored and recent sync runs
    Status,

    /// Print version information
    Version,

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

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "threadsync", "update", "--participants", "--thread", "999", "--json", "-vv",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Update { participants: true }));
        assert_eq!(cli.thread.as_deref(), Some("999"));
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_report_limit_default() {
        let cli = Cli::try_parse_from(["threadsync", "report", "links"]).unwrap();
        match cli.command {
            Commands::Report { kind, limit } => {
                assert_eq!(kind, "links");
                assert_eq!(limit, 20);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
