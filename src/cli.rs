use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ussd-gateway")]
#[command(about = "USSD session gateway: aggregator webhook to payments backend.")]
pub struct Cli {
    /// Override the directory config.yml / config.local.yml are read from.
    #[arg(long, global = true)]
    pub conf: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP gateway. Default bind: 0.0.0.0:9000 unless overridden
    /// by config or --bind.
    Serve {
        /// Listen address (e.g. 0.0.0.0:9000)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Load and validate configuration, then exit. Useful in CI/deploy
    /// pipelines before rolling out a new config.yml.
    CheckConfig,
}
