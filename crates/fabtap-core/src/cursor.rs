//! Listener cursor: the last block number whose handling began.
//!
//! The cursor is read once when a listener is built (see
//! [`ListenerBuilder::resume_from`](crate::listener::ListenerBuilder::resume_from))
//! and overwritten by [`CursorWriter`](crate::handler::CursorWriter) before each
//! block is passed further down the chain.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TapError;

/// Trait for loading and saving the cursor.
///
/// Implementations include [`FileCursorStore`], [`MemoryCursorStore`], and the
/// SQLite store in `fabtap-storage`.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// The saved block number, or `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<u64>, TapError>;

    /// Overwrite the saved block number.
    async fn save(&self, block_number: u64) -> Result<(), TapError>;
}

// ─── File store ───────────────────────────────────────────────────────────────

/// Cursor kept as decimal text in a single file.
///
/// A missing file means no cursor. Surrounding whitespace is ignored when
/// reading. Saves write `<path>.tmp` and rename it over the cursor, so a
/// crash mid-write leaves the previous value in place.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<Option<u64>, TapError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(TapError::Storage(format!(
                    "read cursor {}: {e}",
                    self.path.display()
                )))
            }
        };
        let trimmed = text.trim();
        trimmed.parse::<u64>().map(Some).map_err(|e| {
            TapError::Storage(format!(
                "cursor {} holds '{trimmed}', not a block number: {e}",
                self.path.display()
            ))
        })
    }

    async fn save(&self, block_number: u64) -> Result<(), TapError> {
        let temp = self.temp_path();
        tokio::fs::write(&temp, block_number.to_string())
            .await
            .map_err(|e| TapError::Storage(format!("write cursor {}: {e}", temp.display())))?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            TapError::Storage(format!(
                "replace cursor {} with {}: {e}",
                self.path.display(),
                temp.display()
            ))
        })
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

/// In-memory cursor for tests and one-off sessions.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    value: Mutex<Option<u64>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(block_number: u64) -> Self {
        Self {
            value: Mutex::new(Some(block_number)),
        }
    }

    /// Current value without going through the async trait.
    pub fn get(&self) -> Option<u64> {
        *self.value.lock().unwrap()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<Option<u64>, TapError> {
        Ok(self.get())
    }

    async fn save(&self, block_number: u64) -> Result<(), TapError> {
        *self.value.lock().unwrap() = Some(block_number);
        Ok(())
    }
}
