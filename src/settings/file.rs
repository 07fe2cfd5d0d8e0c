//! JSON file store
//!
//! All keys live in a single JSON object on disk. A missing file is an empty
//! store; a file that does not parse is reported as an error so the adapter
//! falls back to defaults without overwriting the user's data on read.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::SettingsStore;

pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No store file yet");
                return Ok(Map::new());
            }
            Err(e) => {
                return Err(e).context(format!("Failed to read store at {}", self.path.display()));
            }
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&contents)
            .context(format!("Failed to parse store at {}", self.path.display()))?
        {
            Value::Object(map) => Ok(map),
            _ => Err(anyhow!("Store at {} is not a JSON object", self.path.display())),
        }
    }

    async fn write_all(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create store directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(map).context("Failed to serialize store")?;

        // Write next to the target and rename so readers never see half a file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .context(format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .context(format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_all().await?;
        let created = map.is_empty();
        map.insert(key.to_string(), value);
        self.write_all(&map).await?;
        if created {
            info!(path = %self.path.display(), "Created settings store");
        }
        Ok(())
    }
}
