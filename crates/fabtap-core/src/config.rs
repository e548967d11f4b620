//! Configuration types.
//!
//! These are plain `serde` structs; the CLI reads them from YAML and lets
//! command-line flags override individual fields.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TapError;
use crate::handler::block::compile;
use crate::handler::tx::parse_header_type;
use crate::source::DEFAULT_BUFFER;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TapConfig {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    /// Where the cursor lives. `None` disables cursor persistence.
    #[serde(default)]
    pub cursor: Option<CursorConfig>,
    #[serde(default)]
    pub logging: LogConfig,
}

impl TapConfig {
    /// Check values that deserialization alone cannot.
    pub fn validate(&self) -> Result<(), TapError> {
        if let (Some(start), Some(end)) = (self.listener.start_block, self.listener.end_block) {
            if end < start {
                return Err(TapError::Config(format!(
                    "listener.end_block {end} is before listener.start_block {start}"
                )));
            }
        }
        if self.listener.channel_buffer == 0 {
            return Err(TapError::Config("listener.channel_buffer must be at least 1".into()));
        }
        if let Some(pattern) = &self.filters.block_hash {
            compile(pattern)?;
        }
        if let Some(pattern) = &self.filters.tx_id {
            compile(pattern)?;
        }
        if let Some(name) = &self.filters.tx_type {
            parse_header_type(name)?;
        }
        Ok(())
    }
}

/// Listener bounds and channel sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// First block (inclusive). Unset means the newest block, or the saved cursor.
    #[serde(default)]
    pub start_block: Option<u64>,
    /// Last block (inclusive). Unset means run until stopped.
    #[serde(default)]
    pub end_block: Option<u64>,
    /// Capacity of the event channel.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_channel_buffer() -> usize {
    DEFAULT_BUFFER
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            start_block: None,
            end_block: None,
            channel_buffer: DEFAULT_BUFFER,
        }
    }
}

/// Filters applied in front of the block and transaction chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Regular expression over the lowercase hex block hash.
    #[serde(default)]
    pub block_hash: Option<String>,
    /// Regular expression over the transaction ID.
    #[serde(default)]
    pub tx_id: Option<String>,
    /// Header type name (`"ENDORSER_TRANSACTION"`) or number (`"3"`).
    #[serde(default)]
    pub tx_type: Option<String>,
    /// Only pass valid endorser transactions to the transaction handlers.
    #[serde(default = "default_true")]
    pub valid_endorser_only: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            block_hash: None,
            tx_id: None,
            tx_type: None,
            valid_endorser_only: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Cursor persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CursorConfig {
    /// Decimal block number in a text file.
    File { path: PathBuf },
    /// Row in a SQLite database (requires the `sqlite` feature of `fabtap-storage`).
    Sqlite {
        url: String,
        #[serde(default = "default_cursor_key")]
        key: String,
    },
}

fn default_cursor_key() -> String {
    "default".into()
}

/// Log level per component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: component_name → level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directive string, e.g. `"info,fabtap_core=debug"`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}
