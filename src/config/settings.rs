//! Application settings and configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`UploadSettings::cloud_name`]
pub const ENV_CLOUD_NAME: &str = "POOKIE_CLOUD_NAME";
/// Environment variable overriding [`UploadSettings::upload_preset`]
pub const ENV_UPLOAD_PRESET: &str = "POOKIE_UPLOAD_PRESET";
/// Environment variable overriding [`UploadSettings::base_url`]
pub const ENV_UPLOAD_URL: &str = "POOKIE_UPLOAD_URL";

/// Media upload endpoint credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Scheme and host of the upload API
    pub base_url: String,
    /// Account ("cloud") name, part of the upload path
    pub cloud_name: String,
    /// Unsigned upload preset
    pub upload_preset: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl UploadSettings {
    /// Full upload URL
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1_1/{}/auto/upload",
            self.base_url.trim_end_matches('/'),
            self.cloud_name
        )
    }

    /// Whether both credentials are present
    pub fn is_configured(&self) -> bool {
        !self.cloud_name.trim().is_empty() && !self.upload_preset.trim().is_empty()
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.cloudinary.com".to_string(),
            cloud_name: String::new(),
            upload_preset: String::new(),
            timeout_secs: 60,
        }
    }
}

/// Application settings
///
/// Persistent configuration stored in JSON format. Missing fields take their
/// defaults, so older files keep loading.
///
/// # Example
/// ```rust,no_run
/// use pookie_chat::config::Settings;
///
/// // Load settings (returns default if file doesn't exist)
/// let mut settings = Settings::load("settings.json").expect("Failed to load");
/// settings.apply_env();
///
/// println!("Uploads go to {}", settings.upload.endpoint());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Media upload endpoint
    pub upload: UploadSettings,
    /// SQLite file for the local document store
    pub database_path: String,
    /// Characters of the last message shown in the conversation list
    pub preview_max_chars: usize,
    /// Avatar shown for users without one
    pub default_avatar_url: String,
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// # Returns
    /// The loaded settings, or default settings if the file doesn't exist or is empty
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("Failed to read settings: {}", e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&data)
            .map_err(|e| Error::Storage(format!("Failed to parse settings: {}", e)))
    }

    /// Save settings to a JSON file, creating parent directories
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create settings directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Storage(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| Error::Storage(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }

    /// Override upload credentials from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override upload credentials from `lookup`; blank values are ignored
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = present(ENV_CLOUD_NAME) {
            self.upload.cloud_name = v;
        }
        if let Some(v) = present(ENV_UPLOAD_PRESET) {
            self.upload.upload_preset = v;
        }
        if let Some(v) = present(ENV_UPLOAD_URL) {
            self.upload.base_url = v;
        }
    }

    /// Truncate a conversation preview to [`Settings::preview_max_chars`]
    pub fn truncate_preview(&self, text: &str) -> String {
        text.chars().take(self.preview_max_chars).collect()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upload: UploadSettings::default(),
            database_path: "./data/pookie.db".to_string(),
            preview_max_chars: 20,
            default_avatar_url: "https://cdn-icons-png.flaticon.com/512/847/847969.png".to_string(),
        }
    }
}
