//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Timesheets estimated from git history.
///
/// Groups commits into work sessions and estimates the time spent on each.
#[derive(Debug, Parser)]
#[command(name = "gts", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a timesheet.
    Generate {
        #[command(flatten)]
        history: HistoryArgs,

        /// Learn work hours and gaps from the commits before grouping.
        #[arg(long)]
        learn_patterns: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the work pattern learned from commit history.
    Patterns {
        #[command(flatten)]
        history: HistoryArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the holidays that would be excluded in a year.
    Holidays {
        /// Year to list (defaults to the current year).
        #[arg(long)]
        year: Option<i32>,

        /// ISO country code (overrides config).
        #[arg(long)]
        country: Option<String>,

        /// Region within the country, e.g. MA (overrides config).
        #[arg(long)]
        region: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Where commits come from and which ones to read.
#[derive(Debug, Clone, Args)]
pub struct HistoryArgs {
    /// Repository to read (repeatable). Defaults to the current directory.
    #[arg(short, long = "repo", value_name = "PATH")]
    pub repos: Vec<PathBuf>,

    /// Read `git log` output from a file ("-" for stdin) instead of a repository.
    ///
    /// The log must use the record format printed by `--print-format`.
    #[arg(long, value_name = "FILE", conflicts_with = "repos")]
    pub input: Option<PathBuf>,

    /// Print the `git log --pretty` format expected by `--input` and exit.
    #[arg(long)]
    pub print_format: bool,

    /// Only commits after this time (ISO 8601, YYYY-MM-DD, or relative like "2 weeks ago").
    #[arg(long)]
    pub since: Option<String>,

    /// Only commits before this time.
    #[arg(long)]
    pub until: Option<String>,

    /// Only commits by matching authors.
    #[arg(long)]
    pub author: Option<String>,

    /// Branch or revision to walk instead of HEAD (repeatable).
    #[arg(short, long = "branch", value_name = "REV")]
    pub branches: Vec<String>,

    /// Skip merge commits.
    #[arg(long)]
    pub no_merges: bool,

    /// Read at most this many commits per repository.
    #[arg(long)]
    pub max_count: Option<usize>,

    /// Collect per-file line counts for complexity estimates.
    #[arg(long)]
    pub file_stats: bool,
}
