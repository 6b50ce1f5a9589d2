//! Storage layer for autoloop - append-only persistence of decisions,
//! actions and metrics.
//!
//! The control loop only sees `PersistenceStore`; the backend is picked from
//! configuration.

mod jsonl;
mod memory;
mod sqlite;
mod traits;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{LoopStatsSummary, MetricRecord, PersistenceStore};

/// SQLite database file name inside the storage directory
pub const SQLITE_FILE: &str = "autoloop.db";

/// Which store implementation to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Jsonl,
    Sqlite,
    /// Unbounded in-process vectors; for tests and embedding callers only.
    /// `Config::build_loop` refuses it.
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Jsonl => write!(f, "jsonl"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Open the configured store rooted at `dir`.
pub fn open_store(backend: StorageBackend, dir: &Path) -> Result<Arc<dyn PersistenceStore>> {
    log::debug!("open_store: backend={} dir={}", backend, dir.display());
    let store: Arc<dyn PersistenceStore> = match backend {
        StorageBackend::Jsonl => Arc::new(JsonlStore::new(dir)?),
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(dir.join(SQLITE_FILE))?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}
