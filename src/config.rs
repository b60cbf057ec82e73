use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audit::SeverityPenalties;
use crate::evaluation::ScoringWeights;

/// Main configuration structure for the procurement workflow engine
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Proposal evaluation and award settings
    pub workflow: WorkflowConfig,
    /// Audit scoring settings
    pub audit: AuditConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Database settings (optional, used with the `database` feature)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Weights used when neither the caller nor the market request sets any
    pub scoring_weights: ScoringWeights,
    /// Reason stamped on sibling proposals when a market request is awarded
    pub award_rejection_reason: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Compliance score penalty per unresolved finding
    pub penalties: SeverityPenalties,
    /// Days before the end date at which a non-renewing contract is flagged
    pub expiry_warning_days: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level, overridden by RUST_LOG when set
    pub log_level: String,
    /// Emit JSON lines instead of human readable logs
    pub json_logs: bool,
    /// Enable transition metrics collection
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig {
                scoring_weights: ScoringWeights::default(),
                award_rejection_reason: "Contract awarded to another vendor".to_string(),
            },
            audit: AuditConfig {
                penalties: SeverityPenalties::default(),
                expiry_warning_days: 30,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
                metrics_enabled: true,
            },
            database: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (procurement.toml, .procurement-rc)
    /// 3. Environment variables (prefixed with PROCUREMENT__)
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Same as [`EngineConfig::load`] with an extra file layered above the
    /// default files
    pub fn load_with(extra_file: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&EngineConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("procurement.toml").exists() {
            builder = builder.add_source(File::with_name("procurement"));
        }

        if Path::new(".procurement-rc").exists() {
            builder = builder.add_source(File::new(".procurement-rc", config::FileFormat::Toml));
        }

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("PROCUREMENT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder
            .build()?
            .try_deserialize()
            .context("invalid procurement configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.workflow
            .scoring_weights
            .validate()
            .context("workflow.scoring_weights")?;
        if self.workflow.award_rejection_reason.trim().is_empty() {
            anyhow::bail!("workflow.award_rejection_reason must not be empty");
        }
        if self.audit.expiry_warning_days < 0 {
            anyhow::bail!("audit.expiry_warning_days must not be negative");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<EngineConfig, anyhow::Error>> = std::sync::LazyLock::new(|| {
    let _ = EngineConfig::load_env_file();
    EngineConfig::load()
});

/// Get the global configuration
pub fn config() -> Result<&'static EngineConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
