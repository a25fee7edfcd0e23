//! CLI for the dlq download queue.

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use dlq_core::config;

pub use commands::GetArgs;
use commands::{run_config, run_get};

/// Top-level CLI for the dlq download queue.
#[derive(Debug, Parser)]
#[command(name = "dlq")]
#[command(about = "dlq: bounded-concurrency download queue with retry", long_about = None)]
pub struct Cli {
    /// More log detail in the log file (-v, -vv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download URLs, at most N at a time, retrying failed transfers.
    Get(GetArgs),

    /// Show the config file location and effective settings.
    Config,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match self.command {
            CliCommand::Get(args) => run_get(&cfg, args).await?,
            CliCommand::Config => run_config(&cfg)?,
        }
        Ok(())
    }
}
