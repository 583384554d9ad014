//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "sqlbind")]
#[command(author, version, about = "Parameter binding analysis for SQL in string templates")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to the nearest sqlbind.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show which column each placeholder of a SQL statement is bound to
    Analyze {
        /// SQL files to analyze (supports glob patterns)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// JSON schema catalog used to show expected host types
        #[arg(short, long, value_name = "FILE")]
        schema: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "human", value_enum)]
        format: OutputFormat,
    },

    /// Split a SQL statement at its first N placeholders
    Segment {
        /// SQL file to split
        file: PathBuf,

        /// Number of placeholders the statement must contain
        #[arg(short = 'n', long, value_name = "N")]
        params: usize,
    },

    /// Check templates against a schema catalog
    Check {
        /// Template files to check (supports glob patterns)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// JSON schema catalog
        #[arg(short, long, value_name = "FILE")]
        schema: Option<PathBuf>,

        /// Schema used for relations without one
        #[arg(long, value_name = "NAME", env = "SQLBIND_DEFAULT_SCHEMA")]
        default_schema: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "human", value_enum)]
        format: OutputFormat,
    },

    /// Format templates with pgFormatter
    Fmt {
        /// Template files to format (supports glob patterns)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Report files that would change without writing them
        #[arg(long)]
        check: bool,
    },

    /// Dump the lowered parse tree (for debugging)
    Parse {
        /// SQL file to parse
        file: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output
    Json,
}
