use etude_ports::storage::{KeyValuePort, SettingsDto, StorageError, StoragePort};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

type Entries = BTreeMap<String, String>;

/// JSON files under one directory: `settings.json` for [`SettingsDto`] and
/// `practice_session.json` for the durable key-value entries.
pub struct FsStorage {
    base_dir: PathBuf,
    kv_lock: Mutex<()>,
}

impl FsStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            kv_lock: Mutex::new(()),
        }
    }

    pub fn default_base_dir() -> Result<PathBuf, StorageError> {
        let base = dirs_next::config_dir()
            .ok_or_else(|| StorageError::Io("config dir not found".to_string()))?;
        Ok(base.join("Etude"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn settings_path(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }

    fn kv_path(&self) -> PathBuf {
        self.base_dir.join("practice_session.json")
    }

    fn read_entries(&self) -> Result<Entries, StorageError> {
        let path = self.kv_path();
        if !path.exists() {
            return Ok(Entries::new());
        }
        Self::read_json(&path)
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
        let data = fs::read(path).map_err(|e| StorageError::Io(e.to_string()))?;
        serde_json::from_slice(&data).map_err(|e| StorageError::Serde(e.to_string()))
    }

    /// Writes to a sibling temp file and renames it over the target, so readers
    /// see either the old or the new document.
    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|e| StorageError::Io(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StorageError::Io(e.to_string())
        })
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(base_dir)
    }
}

impl StoragePort for FsStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(SettingsDto::default());
        }
        Self::read_json(&path)
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        let path = self.settings_path();
        Self::write_json(&path, s)
    }
}

impl KeyValuePort for FsStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.kv_lock.lock();
        Ok(self.read_entries()?.remove(key))
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        let _guard = self.kv_lock.lock();
        let mut current = self.read_entries()?;
        for (key, value) in entries {
            current.insert(key.to_string(), value.to_string());
        }
        Self::write_json(&self.kv_path(), &current)?;
        tracing::debug!(keys = entries.len(), "practice keys written");
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = self.kv_lock.lock();
        let mut current = self.read_entries()?;
        let before = current.len();
        current.retain(|key, _| !keys.contains(&key.as_str()));
        if current.len() == before {
            return Ok(());
        }
        if current.is_empty() {
            return fs::remove_file(self.kv_path()).map_err(|e| StorageError::Io(e.to_string()));
        }
        Self::write_json(&self.kv_path(), &current)
    }
}
