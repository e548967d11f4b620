//! YAML configuration loading and cursor backend selection.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use fabtap_core::{CursorConfig, CursorStore, FileCursorStore, MetadataSink, TapConfig};

/// Read a YAML config file, or return defaults when no path is given.
pub fn load(path: Option<&Path>) -> Result<TapConfig> {
    let Some(path) = path else {
        return Ok(TapConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    parse(&text).with_context(|| format!("invalid config file {}", path.display()))
}

pub fn parse(text: &str) -> Result<TapConfig> {
    let config: TapConfig = serde_yaml::from_str(text)?;
    Ok(config)
}

/// Cursor store plus, for database backends, a sink sharing the same database.
pub struct Backend {
    pub cursor: Arc<dyn CursorStore>,
    pub sink: Option<Arc<dyn MetadataSink>>,
}

pub async fn open_backend(config: &CursorConfig) -> Result<Backend> {
    match config {
        CursorConfig::File { path } => Ok(Backend {
            cursor: Arc::new(FileCursorStore::new(path)),
            sink: None,
        }),
        #[cfg(feature = "sqlite")]
        CursorConfig::Sqlite { url, key } => {
            let storage = fabtap_storage::SqliteStorage::open(url)
                .await
                .with_context(|| format!("cannot open SQLite database {url}"))?
                .with_cursor_key(key.clone());
            let storage = Arc::new(storage);
            Ok(Backend {
                cursor: storage.clone(),
                sink: Some(storage),
            })
        }
        #[cfg(not(feature = "sqlite"))]
        CursorConfig::Sqlite { .. } => {
            bail!("SQLite cursor configured but fabtap was built without the `sqlite` feature")
        }
    }
}

/// The configured cursor backend, failing when none is configured.
pub async fn require_backend(config: &TapConfig) -> Result<Backend> {
    match &config.cursor {
        Some(cursor) => open_backend(cursor).await,
        None => bail!("no cursor configured (use --cursor or the `cursor` section of the config file)"),
    }
}
