//! Settings store adapter
//!
//! The persistent key-value collaborator is the [`SettingsStore`] trait. Both
//! features talk to it through [`SettingsAdapter`], which never fails loudly:
//! read errors become "absent", write errors become `false`, and both are
//! logged. The caller decides whether "absent" means "use defaults".

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Flat key-value store holding JSON values
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Typed, non-fatal access to a [`SettingsStore`]
#[derive(Clone)]
pub struct SettingsAdapter {
    store: Arc<dyn SettingsStore>,
}

impl SettingsAdapter {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Raw value, `None` when absent or when the store failed
    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read settings, using in-memory defaults");
                None
            }
        }
    }

    /// Write a raw value, `false` when the store failed
    pub async fn set(&self, key: &str, value: Value) -> bool {
        match self.store.set(key, value).await {
            Ok(()) => {
                debug!(key, "Saved settings");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to save settings");
                false
            }
        }
    }

    /// Stored value decoded as `T`; undecodable values count as absent
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        serde_json::from_value(value)
            .inspect_err(|e| warn!(key, error = %e, "Stored settings have an unexpected shape"))
            .ok()
    }

    pub async fn set_as<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set(key, value).await,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize settings");
                false
            }
        }
    }

    /// Stored object shallow-merged over `T::default()`
    pub async fn load_merged<T>(&self, key: &str) -> T
    where
        T: Default + Serialize + DeserializeOwned,
    {
        let defaults = T::default();
        match self.get(key).await {
            Some(stored) => merge_shallow(&defaults, stored).unwrap_or(defaults),
            None => defaults,
        }
    }
}

/// Overlay the top-level keys of `stored` onto the serialized `defaults`.
///
/// Nested objects are replaced wholesale, not merged. Returns `None` when the
/// merged value no longer decodes as `T`.
pub fn merge_shallow<T>(defaults: &T, stored: Value) -> Option<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut base = serde_json::to_value(defaults).ok()?;
    match (base.as_object_mut(), stored) {
        (Some(base_map), Value::Object(stored_map)) => {
            for (key, value) in stored_map {
                base_map.insert(key, value);
            }
        }
        (_, other) => {
            warn!(stored = %other, "Stored settings are not an object, ignoring");
            return None;
        }
    }
    serde_json::from_value(base)
        .inspect_err(|e| warn!(error = %e, "Merged settings failed to decode, using defaults"))
        .ok()
}
