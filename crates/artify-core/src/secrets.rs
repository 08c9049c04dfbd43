// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Secret store adapter
//
// The bearer token and cached username live behind an opaque key-value store.
// Platforms plug in their secure storage by implementing SecretStore.

use crate::types::AppError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Key holding the bearer token
pub const TOKEN_KEY: &str = "my-jwt";
/// Key holding the cached display name
pub const USERNAME_KEY: &str = "userName";

/// Opaque string key-value persistence for credentials
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    /// Removing a missing key is not an error
    fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Volatile store, used by tests and by sessions that must not touch disk
#[derive(Default)]
pub struct MemorySecretStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), AppError> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct SecretsFile {
    entries: HashMap<String, String>,
}

/// File-based store for desktop use; the file is written with owner-only permissions on unix
pub struct FileSecretStore {
    entries: RwLock<HashMap<String, String>>,
    file_path: PathBuf,
}

impl FileSecretStore {
    /// Open the store in the platform config directory
    pub fn new() -> Result<Self, AppError> {
        Self::with_path(crate::settings::config_dir()?.join("secrets.json"))
    }

    /// Open a store backed by an explicit file, loading it if present
    pub fn with_path(file_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let file_path = file_path.as_ref().to_path_buf();

        let entries = if file_path.exists() {
            let content = fs::read_to_string(&file_path)
                .map_err(|e| AppError::FileIo(format!("Failed to read secrets: {}", e)))?;

            let file: SecretsFile = serde_json::from_str(&content)
                .map_err(|e| AppError::Serialization(format!("Failed to parse secrets: {}", e)))?;

            file.entries
        } else {
            HashMap::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            file_path,
        })
    }

    fn persist(&self) -> Result<(), AppError> {
        let content = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            let file = SecretsFile {
                entries: entries.clone(),
            };
            serde_json::to_string_pretty(&file)
                .map_err(|e| AppError::Serialization(format!("Failed to serialize secrets: {}", e)))?
        };

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.file_path, content)
            .map_err(|e| AppError::FileIo(format!("Failed to write secrets: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.file_path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries.insert(key.to_string(), value.to_string());
        }
        self.persist()
    }

    fn delete(&self, key: &str) -> Result<(), AppError> {
        let removed = {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries.remove(key).is_some()
        };

        if removed {
            self.persist()?;
        }
        Ok(())
    }
}
