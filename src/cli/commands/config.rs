use anyhow::{bail, Result};
use std::path::PathBuf;

use super::Command;
use crate::config::EngineConfig;

pub struct ConfigShowCommand {
    pub config: EngineConfig,
}

impl Command for ConfigShowCommand {
    async fn execute(&self) -> Result<()> {
        print!("{}", toml::to_string_pretty(&self.config)?);
        Ok(())
    }
}

pub struct ConfigInitCommand {
    pub path: PathBuf,
    pub force: bool,
}

impl Command for ConfigInitCommand {
    async fn execute(&self) -> Result<()> {
        if self.path.exists() && !self.force {
            bail!("{} already exists (use --force to overwrite)", self.path.display());
        }
        EngineConfig::default().save_to_file(&self.path)?;
        println!("✅ Wrote default configuration to {}", self.path.display());
        Ok(())
    }
}
