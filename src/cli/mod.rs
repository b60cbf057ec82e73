use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "procurement")]
#[command(about = "Inspect procurement workflow snapshots")]
#[command(long_about = "Read-only views over an exported procurement snapshot: dashboard statistics, \
                       proposal rankings and contract risk. Transitions are never performed from here.")]
pub struct Cli {
    /// Extra configuration file layered above procurement.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dashboard statistics across every entity in the snapshot
    Stats {
        /// Snapshot file exported by the engine
        #[arg(long)]
        snapshot: PathBuf,
        /// Evaluate time-dependent figures at this RFC 3339 instant instead of now
        #[arg(long)]
        as_of: Option<String>,
        /// Print JSON instead of a text summary
        #[arg(long)]
        json: bool,
    },
    /// Rank the submitted proposals of one market request
    Rank {
        #[arg(long)]
        snapshot: PathBuf,
        /// Market request id
        #[arg(long)]
        market: String,
        #[arg(long)]
        json: bool,
    },
    /// Contracts ordered by their current audit risk
    Risk {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration to a file
    Init {
        #[arg(long, default_value = "procurement.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
