//! SQLite storage backend for fabtap.
//!
//! Persists the listener cursor and sink records to a single SQLite file.
//! Several listeners can share one database by using different cursor keys.
//!
//! # Usage
//! ```rust,no_run
//! use fabtap_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./fabtap.db").await?.with_cursor_key("mychannel");
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use fabtap_core::cursor::CursorStore;
use fabtap_core::error::TapError;
use fabtap_core::sink::{MetadataSink, SinkRecord};

fn storage_err(e: impl std::fmt::Display) -> TapError {
    TapError::Storage(e.to_string())
}

/// SQLite-backed cursor and record storage.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    cursor_key: String,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./fabtap.db"`) or a full
    /// SQLite URL (`"sqlite:./fabtap.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, TapError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let storage = Self {
            pool,
            cursor_key: "default".into(),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, TapError> {
        // every connection to `:memory:` is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let storage = Self {
            pool,
            cursor_key: "default".into(),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Key under which [`CursorStore`] reads and writes the cursor.
    pub fn with_cursor_key(mut self, key: impl Into<String>) -> Self {
        self.cursor_key = key.into();
        self
    }

    pub fn cursor_key(&self) -> &str {
        &self.cursor_key
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), TapError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cursors (
                key          TEXT    PRIMARY KEY,
                block_number INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                key        TEXT    PRIMARY KEY,
                value      TEXT    NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }
}

// ─── CursorStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl CursorStore for SqliteStorage {
    async fn load(&self) -> Result<Option<u64>, TapError> {
        let row = sqlx::query("SELECT block_number FROM cursors WHERE key = ?")
            .bind(&self.cursor_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.map(|r| r.get::<i64, _>("block_number") as u64))
    }

    async fn save(&self, block_number: u64) -> Result<(), TapError> {
        let number = i64::try_from(block_number)
            .map_err(|_| TapError::Storage(format!("block number {block_number} exceeds SQLite INTEGER")))?;
        sqlx::query(
            "INSERT OR REPLACE INTO cursors (key, block_number, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(&self.cursor_key)
        .bind(number)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(key = %self.cursor_key, block = block_number, "cursor saved");
        Ok(())
    }
}

// ─── MetadataSink impl ───────────────────────────────────────────────────────

#[async_trait]
impl MetadataSink for SqliteStorage {
    async fn put(&self, record: SinkRecord) -> Result<(), TapError> {
        let value = serde_json::to_string(&record.value).map_err(storage_err)?;
        sqlx::query(
            "INSERT OR REPLACE INTO records (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(&record.key)
        .bind(&value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(key = %record.key, "record stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<SinkRecord>, TapError> {
        let row = sqlx::query("SELECT key, value FROM records WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.get("value");
        let value = serde_json::from_str(&raw).map_err(storage_err)?;
        Ok(Some(SinkRecord {
            key: row.get("key"),
            value,
        }))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
