//! SettingsStore の実装
//!
//! - **MemorySettings**: テスト用
//! - **FileSettings**: データディレクトリ内の `settings.json`（文字列のキー／値）

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::PersistenceError;
use crate::ports::SettingsStore;

#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> R) -> R {
        f(&mut self.values.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.with(|values| values.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.with(|values| values.insert(key.to_string(), value.to_string()));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.with(|values| values.remove(key));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join("settings.json"),
        }
    }

    async fn read(&self) -> Result<BTreeMap<String, String>, PersistenceError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| PersistenceError::Corrupt(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        })
        .await
        .map_err(|e| PersistenceError::Unavailable(format!("settings task failed: {e}")))?
    }

    async fn write(&self, values: BTreeMap<String, String>) -> Result<(), PersistenceError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let bytes = serde_json::to_vec_pretty(&values)
                .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, bytes)?;
            fs::rename(&tmp, &path)?;
            Ok(())
        })
        .await
        .map_err(|e| PersistenceError::Unavailable(format!("settings task failed: {e}")))?
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.read().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut values = self.read().await?;
        values.insert(key.to_string(), value.to_string());
        self.write(values).await
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut values = self.read().await?;
        if values.remove(key).is_some() {
            self.write(values).await?;
        }
        Ok(())
    }
}
