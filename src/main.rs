use anyhow::Result;
use clap::Parser;

use procurement_workflow::cli::commands::config::{ConfigInitCommand, ConfigShowCommand};
use procurement_workflow::cli::commands::rank::RankCommand;
use procurement_workflow::cli::commands::risk::RiskCommand;
use procurement_workflow::cli::commands::stats::StatsCommand;
use procurement_workflow::cli::commands::Command;
use procurement_workflow::cli::{Cli, Commands, ConfigAction};
use procurement_workflow::config::{config, EngineConfig};
use procurement_workflow::telemetry::init_telemetry;

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    match &cli.config {
        Some(path) => {
            EngineConfig::load_env_file()?;
            EngineConfig::load_with(Some(path.as_path()))
        }
        None => Ok(config()?.clone()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `config init` must work even when the existing configuration is broken
    if let Commands::Config {
        action: ConfigAction::Init { path, force },
    } = &cli.command
    {
        return ConfigInitCommand {
            path: path.clone(),
            force: *force,
        }
        .execute()
        .await;
    }

    let config = load_config(&cli)?;
    init_telemetry(&config.observability)?;
    tracing::debug!(command = ?std::env::args().nth(1), "Starting procurement CLI");

    match cli.command {
        Commands::Stats { snapshot, as_of, json } => {
            StatsCommand {
                snapshot,
                as_of,
                json,
                expiry_window_days: config.audit.expiry_warning_days,
            }
            .execute()
            .await
        }
        Commands::Rank { snapshot, market, json } => {
            RankCommand {
                snapshot,
                market: market.into(),
                json,
            }
            .execute()
            .await
        }
        Commands::Risk { snapshot, json } => RiskCommand { snapshot, json }.execute().await,
        Commands::Config {
            action: ConfigAction::Show,
        } => ConfigShowCommand { config }.execute().await,
        Commands::Config {
            action: ConfigAction::Init { .. },
        } => Ok(()),
    }
}
