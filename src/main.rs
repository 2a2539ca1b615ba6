use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use janitor::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    let log_name = logging::log_name(&args.profile);
    logging::init_subscriber(args.verbose, &log_name);
    let log = Arc::new(logging::Logger::new(&log_name));

    commands::run::run(&args, &log)
}
