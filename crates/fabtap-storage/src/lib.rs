//! fabtap-storage: storage backends for fabtap.
//!
//! Every backend implements both [`CursorStore`](fabtap_core::CursorStore)
//! and [`MetadataSink`](fabtap_core::MetadataSink). In-memory cursors live in
//! `fabtap_core::MemoryCursorStore`.
//!
//! Backends:
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
