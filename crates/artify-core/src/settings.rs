// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Settings persistence
//
// Settings are stored in a local JSON file next to the other client data.

use crate::types::AppError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

/// Hard ceiling for a single request, in seconds
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Client settings (UI-agnostic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    /// Origin of the image-editing API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Total time allowed per request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// chrono format string used for `created_at_display`
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Default size of the "recent edits" view
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    /// Multipart field name expected by `POST /images`
    #[serde(default = "default_upload_field")]
    pub upload_field: String,
    /// Keep a local copy of the last library snapshot
    #[serde(default = "default_persist_library")]
    pub persist_library: bool,
}

fn default_api_base_url() -> String {
    "https://image-smith.onrender.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_date_format() -> String {
    "%d/%m/%Y".to_string()
}

fn default_recent_limit() -> usize {
    5
}

fn default_upload_field() -> String {
    "file".to_string()
}

fn default_persist_library() -> bool {
    true
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            date_format: default_date_format(),
            recent_limit: default_recent_limit(),
            upload_field: default_upload_field(),
            persist_library: default_persist_library(),
        }
    }
}

impl ClientSettings {
    /// Settings pointing at a specific API origin, other fields default
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Parse and check the configured API origin
    pub fn base_url(&self) -> Result<Url, AppError> {
        let url = Url::parse(self.api_base_url.trim()).map_err(|e| {
            AppError::InvalidConfig(format!("Invalid API base URL '{}': {}", self.api_base_url, e))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(AppError::InvalidConfig(format!(
                "API base URL must use http or https, got '{}'",
                other
            ))),
        }
    }

    /// Request timeout clamped to `1..=MAX_REQUEST_TIMEOUT_SECS`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.clamp(1, MAX_REQUEST_TIMEOUT_SECS))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

/// Resolve (and create) the client's config directory
pub(crate) fn config_dir() -> Result<PathBuf, AppError> {
    let config_dir = directories::ProjectDirs::from("com", "artify", "client")
        .ok_or_else(|| AppError::FileIo("Could not determine config directory".to_string()))?
        .config_dir()
        .to_path_buf();

    fs::create_dir_all(&config_dir)
        .map_err(|e| AppError::FileIo(format!("Failed to create config dir: {}", e)))?;

    Ok(config_dir)
}

/// Resolve (and create) the client's data directory
pub(crate) fn data_dir() -> Result<PathBuf, AppError> {
    let data_dir = directories::ProjectDirs::from("com", "artify", "client")
        .ok_or_else(|| AppError::FileIo("Could not determine data directory".to_string()))?
        .data_dir()
        .to_path_buf();

    fs::create_dir_all(&data_dir)
        .map_err(|e| AppError::FileIo(format!("Failed to create data dir: {}", e)))?;

    Ok(data_dir)
}

/// In-memory cache of settings, persisted to disk on changes
pub struct SettingsStore {
    settings: RwLock<ClientSettings>,
    file_path: PathBuf,
}

impl SettingsStore {
    /// Create a settings store in the platform config directory
    pub fn new() -> Result<Self, AppError> {
        Self::with_path(config_dir()?.join("settings.json"))
    }

    /// Create a settings store backed by an explicit file
    pub fn with_path(file_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let file_path = file_path.as_ref().to_path_buf();
        tracing::info!("Settings file path: {:?}", file_path);

        let settings = if file_path.exists() {
            let content = fs::read_to_string(&file_path)
                .map_err(|e| AppError::FileIo(format!("Failed to read settings: {}", e)))?;

            serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse settings, using defaults: {}", e);
                ClientSettings::default()
            })
        } else {
            tracing::info!("No settings file found, using defaults");
            ClientSettings::default()
        };

        let store = Self {
            settings: RwLock::new(settings),
            file_path,
        };

        if !store.file_path.exists() {
            tracing::info!("Creating initial settings file");
            store.persist()?;
        }

        Ok(store)
    }

    fn persist(&self) -> Result<(), AppError> {
        let content = {
            let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());
            serde_json::to_string_pretty(&*settings).map_err(|e| {
                AppError::Serialization(format!("Failed to serialize settings: {}", e))
            })?
        };

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.file_path, content)
            .map_err(|e| AppError::FileIo(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> ClientSettings {
        self.settings.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Update settings and persist to disk
    pub fn update(&self, new_settings: ClientSettings) -> Result<(), AppError> {
        new_settings.base_url()?;
        tracing::info!("Updating settings, API origin: {}", new_settings.api_base_url);
        {
            let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
            *settings = new_settings;
        }

        let result = self.persist();
        if let Err(e) = &result {
            tracing::error!("Failed to persist settings: {}", e);
        }
        result
    }
}
