//! Command-line interface definition.
use std::path::PathBuf;

use clap::Parser;

use crate::sweeper::BashAction;

/// Top-level CLI entry point for the sweeper.
#[derive(Parser, Debug)]
#[command(
    name = "sweeper",
    about = "List resources with external commands, filter them, and sweep the matches",
    version = option_env!("SWEEPER_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
)]
pub struct Cli {
    /// Path to the INI profile
    pub profile: PathBuf,

    /// Print sections in execution order and exit
    #[arg(short, long)]
    pub list_sections: bool,

    /// List and show counts only; never sweep
    #[arg(short, long, conflicts_with = "sweep")]
    pub stat_only: bool,

    /// Run sweep actions after listing
    #[arg(long)]
    pub sweep: bool,

    /// Run a single section
    #[arg(long, value_name = "NAME")]
    pub section: Option<String>,

    /// Override the profile's filter pattern
    #[arg(short, long, value_name = "PATTERN")]
    pub filter_regex: Option<String>,

    /// Print commands instead of running them
    #[arg(long, value_enum, value_name = "ACTION")]
    pub bash_action: Option<BashAction>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
