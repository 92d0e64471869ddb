//! Thread-safe settings manager for concurrent access

use crate::{
    config::settings::{Settings, UploadSettings},
    Result,
};

/// Thread-safe settings manager
///
/// Provides shared access to application settings with automatic persistence.
///
/// # Example
/// ```rust,no_run
/// use pookie_chat::config::SettingsManager;
///
/// # async fn example() -> pookie_chat::Result<()> {
/// let manager = SettingsManager::new("settings.json").await?;
///
/// // Update settings (auto-saves)
/// manager.set_upload_credentials("demo", "unsigned_preset").await?;
///
/// // Share with a background task
/// let worker = manager.clone();
/// tokio::spawn(async move {
///     let upload = worker.get_upload_settings().await;
///     println!("Uploading to {}", upload.endpoint());
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SettingsManager {
    /// Shared settings state
    settings: std::sync::Arc<tokio::sync::RwLock<Settings>>,
    /// Path to settings file for auto-save
    settings_path: std::sync::Arc<String>,
}

impl SettingsManager {
    /// Create a new settings manager
    ///
    /// Loads settings from the specified path (or defaults), then applies
    /// environment overrides.
    pub async fn new<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let mut settings = Settings::load(&path)?;
        settings.apply_env();

        Ok(Self {
            settings: std::sync::Arc::new(tokio::sync::RwLock::new(settings)),
            settings_path: std::sync::Arc::new(path_str),
        })
    }

    /// Copy of the current settings
    pub async fn snapshot(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Get the upload endpoint settings
    pub async fn get_upload_settings(&self) -> UploadSettings {
        let settings = self.settings.read().await;
        settings.upload.clone()
    }

    /// Set upload credentials and auto-save
    pub async fn set_upload_credentials(&self, cloud_name: &str, upload_preset: &str) -> Result<()> {
        let mut settings = self.settings.write().await;
        settings.upload.cloud_name = cloud_name.to_string();
        settings.upload.upload_preset = upload_preset.to_string();
        settings.save(self.settings_path.as_str())
    }

    /// Get the database path
    pub async fn get_database_path(&self) -> String {
        let settings = self.settings.read().await;
        settings.database_path.clone()
    }

    /// Set the database path and auto-save
    pub async fn set_database_path(&self, path: String) -> Result<()> {
        let mut settings = self.settings.write().await;
        settings.database_path = path;
        settings.save(self.settings_path.as_str())
    }

    /// Get the preview length used by the conversation list
    pub async fn get_preview_max_chars(&self) -> usize {
        let settings = self.settings.read().await;
        settings.preview_max_chars
    }

    /// Set the preview length and auto-save
    pub async fn set_preview_max_chars(&self, chars: usize) -> Result<()> {
        let mut settings = self.settings.write().await;
        settings.preview_max_chars = chars;
        settings.save(self.settings_path.as_str())
    }

    /// Get the settings file path
    pub fn get_settings_path(&self) -> &str {
        self.settings_path.as_str()
    }

    /// Reload settings from disk (discards unsaved changes)
    pub async fn reload(&self) -> Result<()> {
        let mut fresh = Settings::load(self.settings_path.as_str())?;
        fresh.apply_env();
        let mut settings = self.settings.write().await;
        *settings = fresh;
        Ok(())
    }
}
