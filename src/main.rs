//! meshscope - service-mesh traffic diagnostics for Kubernetes
//!
//! Batch commands print one table and exit; `top` takes over the terminal
//! and shows live traffic until quit.

use anyhow::Result;
use clap::Parser;
use meshscope::cli::{self, Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let interactive = matches!(args.command, Command::Top(_));
    let log_file = cli::init_logging(args.debug, interactive);

    // Print log file location to stderr before starting the TUI
    if let Some(ref log_path) = log_file {
        eprintln!(
            "Debug logging enabled. Logs written to: {}",
            log_path.display()
        );
    }

    cli::run(args).await
}
