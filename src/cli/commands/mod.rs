use anyhow::{Context, Result};
use std::path::Path;

use crate::store::Snapshot;

pub mod config;
pub mod rank;
pub mod risk;
pub mod stats;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

pub async fn load_snapshot(path: &Path) -> Result<Snapshot> {
    Snapshot::read_from(path)
        .await
        .with_context(|| format!("failed to read snapshot {}", path.display()))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
