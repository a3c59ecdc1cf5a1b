//! Persisted settings store — JSON save/load across restarts.
//!
//! Backs the front-end variant's `read_setting`/`write_setting`
//! capabilities. The engine never reaches into this store directly; it
//! only sees the interaction trait.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Shared key/value settings, optionally persisted to a JSON file.
///
/// Cloning shares the underlying map, so the front end and the bridge see
/// the same values. Missing or corrupt files fall back to defaults.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl SettingsStore {
    /// Volatile store with no backing file.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed store, loading existing values if the file
    /// parses.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: Some(path),
            values: Arc::new(Mutex::new(values)),
        }
    }

    /// Default platform location for the settings file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("backlab")
            .join("settings.json")
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .expect("settings lock poisoned")
            .get(key)
            .cloned()
    }

    /// Set a value and persist the store when file-backed. Persistence
    /// failures are logged, not surfaced: a read-only disk must not break
    /// a run.
    pub fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .expect("settings lock poisoned")
            .insert(key.to_string(), value.to_string());
        if let Err(e) = self.save() {
            tracing::warn!("failed to persist settings: {e}");
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let values = self.values.lock().expect("settings lock poisoned");
        let json = serde_json::to_string_pretty(&*values)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
