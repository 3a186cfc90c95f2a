use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{FlowError, Result};

/// Trait for storing small string preferences (the client's local key-value store)
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory implementation of PreferenceStore
#[derive(Clone, Default)]
pub struct InMemoryPreferenceStore {
    values: Arc<DashMap<String, String>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// JSON-file implementation of PreferenceStore.
///
/// The whole map is cached in memory and rewritten on every change.
pub struct FilePreferenceStore {
    path: PathBuf,
    values: DashMap<String, String>,
    write_lock: tokio::sync::Mutex<()>,
}

impl FilePreferenceStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<BTreeMap<String, String>>(&bytes)
                .map_err(|e| storage_error(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(storage_error(&path, e)),
        };
        debug!("Loaded {} preference(s) from {}", values.len(), path.display());

        Ok(Self {
            path,
            values: values.into_iter().collect(),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot: BTreeMap<String, String> = self
            .values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let bytes =
            serde_json::to_vec_pretty(&snapshot).map_err(|e| storage_error(&self.path, e))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(&self.path, e))?;
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| storage_error(&self.path, e))
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush().await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush().await?;
        }
        Ok(())
    }
}

fn storage_error(path: &Path, e: impl std::fmt::Display) -> FlowError {
    FlowError::StorageError(format!("{}: {}", path.display(), e))
}
