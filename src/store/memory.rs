use dashmap::DashMap;

use crate::error::StoreError;
use crate::store::StateStore;
use crate::types::AlertState;

/// Process-local backend. Used for ephemeral runs and in tests.
pub struct MemoryStore {
    records: DashMap<String, AlertState>,
    defaults: AlertState,
}

impl MemoryStore {
    pub fn new(defaults: AlertState) -> Self {
        Self {
            records: DashMap::new(),
            defaults,
        }
    }
}

impl StateStore for MemoryStore {
    async fn load(&self, subject: &str) -> Result<AlertState, StoreError> {
        Ok(self
            .records
            .get(subject)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| self.defaults.clone()))
    }

    async fn save(&self, subject: &str, state: &AlertState) -> Result<(), StoreError> {
        self.records.insert(subject.to_string(), state.clone());
        Ok(())
    }
}
