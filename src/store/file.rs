use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::store::StateStore;
use crate::types::AlertState;

type Records = BTreeMap<String, AlertState>;

/// All subjects in one pretty-printed JSON object, replaced by rename on save.
pub struct JsonFileStore {
    path: PathBuf,
    defaults: AlertState,
    /// Serializes the read-modify-write of the shared file.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>, defaults: AlertState) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            defaults,
            write_lock: Mutex::new(()),
        }
    }

    async fn read_records(&self) -> Result<Records, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Records::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    async fn load(&self, subject: &str) -> Result<AlertState, StoreError> {
        let mut records = self.read_records().await?;
        Ok(records
            .remove(subject)
            .unwrap_or_else(|| self.defaults.clone()))
    }

    async fn save(&self, subject: &str, state: &AlertState) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_records().await?;
        records.insert(subject.to_string(), state.clone());
        let body = serde_json::to_vec_pretty(&records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("State saved to {}", self.path.display());
        Ok(())
    }
}
