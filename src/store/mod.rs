//! Durable persistence of `AlertState` records, keyed by subject.
//!
//! Every backend returns the configured defaults for a subject that has
//! never been saved, and `save` always replaces the whole record.

pub mod file;
pub mod memory;
pub mod sqlite;

use std::future::Future;

use tracing::info;

use crate::config::{Config, StateBackend};
use crate::error::StoreError;
use crate::types::AlertState;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub trait StateStore: Send + Sync {
    fn load(&self, subject: &str) -> impl Future<Output = Result<AlertState, StoreError>> + Send;

    fn save(
        &self,
        subject: &str,
        state: &AlertState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Backend selected at startup from `STATE_BACKEND`.
pub enum Store {
    Sqlite(SqliteStore),
    File(JsonFileStore),
    Memory(MemoryStore),
}

impl Store {
    pub async fn open(cfg: &Config) -> Result<Self, StoreError> {
        let defaults =
            AlertState::with_defaults(cfg.default_threshold, cfg.default_interval_minutes);
        let store = match cfg.backend {
            StateBackend::Sqlite => {
                let store = SqliteStore::open(&cfg.db_path, defaults).await?;
                info!("State database ready at {}", cfg.db_path);
                Store::Sqlite(store)
            }
            StateBackend::File => {
                info!("State file at {}", cfg.state_file_path);
                Store::File(JsonFileStore::new(&cfg.state_file_path, defaults))
            }
            StateBackend::Memory => {
                info!("Using in-memory state; nothing survives a restart");
                Store::Memory(MemoryStore::new(defaults))
            }
        };
        Ok(store)
    }
}

impl StateStore for Store {
    async fn load(&self, subject: &str) -> Result<AlertState, StoreError> {
        match self {
            Store::Sqlite(s) => s.load(subject).await,
            Store::File(s) => s.load(subject).await,
            Store::Memory(s) => s.load(subject).await,
        }
    }

    async fn save(&self, subject: &str, state: &AlertState) -> Result<(), StoreError> {
        match self {
            Store::Sqlite(s) => s.save(subject, state).await,
            Store::File(s) => s.save(subject, state).await,
            Store::Memory(s) => s.save(subject, state).await,
        }
    }
}
