use clap::Parser;
use dlq_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Fall back to stderr when the state dir is not writable.
    if logging::init_logging(cli.verbose).is_err() {
        logging::init_logging_stderr(cli.verbose);
    }

    if let Err(err) = cli.run().await {
        eprintln!("dlq error: {:#}", err);
        std::process::exit(1);
    }
}
