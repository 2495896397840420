use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use super::cipher::{SealedPayload, SessionCipher};
use crate::error::StorageError;

/// Durable key-value persistence behind the token store.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove every key in one operation.
    fn remove_all(&self, keys: &[&'static str]) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_all(&self, keys: &[&'static str]) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// JSON map in a single file, optionally sealed with [`SessionCipher`].
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    cipher: Option<SessionCipher>,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cipher: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn encrypted(path: impl Into<PathBuf>, cipher: SessionCipher) -> Self {
        Self {
            cipher: Some(cipher),
            ..Self::new(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        let body = match &self.cipher {
            Some(cipher) => {
                let sealed: SealedPayload = serde_json::from_str(&raw)
                    .map_err(|e| StorageError::Corrupt(e.to_string()))?;
                cipher.open(&sealed)?
            }
            None => raw,
        };
        serde_json::from_str(&body).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    /// Current entries, or an empty map when the file can't be used.
    fn load_or_reset(&self) -> HashMap<String, String> {
        self.load().unwrap_or_else(|e| {
            warn!("Discarding unreadable session file {}: {}", self.path.display(), e);
            HashMap::new()
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let body = serde_json::to_string(entries).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        let contents = match &self.cipher {
            Some(cipher) => serde_json::to_string(&cipher.seal(&body)?)
                .map_err(|e| StorageError::Corrupt(e.to_string()))?,
            None => body,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load_or_reset();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove_all(&self, keys: &[&'static str]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load_or_reset();
        for key in keys {
            entries.remove(*key);
        }
        if entries.is_empty() {
            match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        } else {
            self.persist(&entries)
        }
    }
}
