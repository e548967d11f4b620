//! `fabtap cursor show|set`.

use anyhow::Result;
use fabtap_core::TapConfig;

use crate::config::require_backend;

pub async fn show(config: &TapConfig) -> Result<()> {
    let backend = require_backend(config).await?;
    match backend.cursor.load().await? {
        Some(number) => println!("{number}"),
        None => println!("(unset)"),
    }
    Ok(())
}

pub async fn set(config: &TapConfig, block: u64) -> Result<()> {
    let backend = require_backend(config).await?;
    let previous = backend.cursor.load().await?;
    backend.cursor.save(block).await?;
    tracing::info!(block, previous = ?previous, "cursor updated");
    println!("{block}");
    Ok(())
}
