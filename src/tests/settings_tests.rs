// Settings Tests - Testing Settings, environment overrides and SettingsManager

use crate::config::{Settings, SettingsManager, UploadSettings};
use std::collections::HashMap;
use tempfile::{NamedTempFile, TempDir};

// Settings Tests

#[test]
fn test_settings_default() {
    let settings = Settings::default();

    assert_eq!(settings.upload.base_url, "https://api.cloudinary.com");
    assert!(settings.upload.cloud_name.is_empty());
    assert!(settings.upload.upload_preset.is_empty());
    assert_eq!(settings.upload.timeout_secs, 60);
    assert_eq!(settings.database_path, "./data/pookie.db");
    assert_eq!(settings.preview_max_chars, 20);
    assert!(!settings.default_avatar_url.is_empty());
}

#[test]
fn test_upload_endpoint() {
    let upload = UploadSettings {
        base_url: "http://127.0.0.1:9000/".to_string(),
        cloud_name: "demo".to_string(),
        upload_preset: "unsigned".to_string(),
        timeout_secs: 5,
    };

    assert_eq!(upload.endpoint(), "http://127.0.0.1:9000/v1_1/demo/auto/upload");
    assert!(upload.is_configured());

    let missing_preset = UploadSettings {
        upload_preset: " ".to_string(),
        ..upload
    };
    assert!(!missing_preset.is_configured());
}

#[test]
fn test_settings_save_and_load() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp_file.path();

    let mut settings = Settings::default();
    settings.upload.cloud_name = "demo".to_string();
    settings.preview_max_chars = 32;
    settings.database_path = "/custom/pookie.db".to_string();

    settings.save(path).expect("Failed to save settings");
    let loaded = Settings::load(path).expect("Failed to load settings");

    assert_eq!(loaded, settings);
}

#[test]
fn test_settings_load_missing_or_empty_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let missing = dir.path().join("nope.json");
    assert_eq!(Settings::load(&missing).expect("Failed to load"), Settings::default());

    let empty = NamedTempFile::new().expect("Failed to create temp file");
    assert_eq!(Settings::load(empty.path()).expect("Failed to load"), Settings::default());
}

#[test]
fn test_settings_load_partial_file_uses_defaults() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(temp_file.path(), r#"{ "preview_max_chars": 8 }"#).expect("Failed to write");

    let loaded = Settings::load(temp_file.path()).expect("Failed to load settings");
    assert_eq!(loaded.preview_max_chars, 8);
    assert_eq!(loaded.upload, UploadSettings::default());
}

#[test]
fn test_settings_load_invalid_json() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(temp_file.path(), "{ not json").expect("Failed to write");

    assert!(matches!(
        Settings::load(temp_file.path()),
        Err(crate::Error::Storage(_))
    ));
}

#[test]
fn test_settings_save_creates_directories() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("a").join("b").join("settings.json");

    Settings::default().save(&path).expect("Failed to save settings");
    assert!(path.exists());
}

#[test]
fn test_env_overrides() {
    let env: HashMap<&str, &str> = [
        ("POOKIE_CLOUD_NAME", "env-cloud"),
        ("POOKIE_UPLOAD_PRESET", "env-preset"),
        ("POOKIE_UPLOAD_URL", "  "),
    ]
    .into_iter()
    .collect();

    let mut settings = Settings::default();
    settings.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(settings.upload.cloud_name, "env-cloud");
    assert_eq!(settings.upload.upload_preset, "env-preset");
    assert_eq!(settings.upload.base_url, "https://api.cloudinary.com", "blank values are ignored");
}

#[test]
fn test_truncate_preview() {
    let mut settings = Settings::default();
    settings.preview_max_chars = 5;

    assert_eq!(settings.truncate_preview("hello world"), "hello");
    assert_eq!(settings.truncate_preview("hi"), "hi");
    assert_eq!(settings.truncate_preview("📷 Photo"), "📷 Pho");
}

// SettingsManager Tests

#[tokio::test]
async fn test_settings_manager_auto_saves() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp_file.path();

    let manager = SettingsManager::new(path).await.expect("Failed to create manager");
    manager
        .set_upload_credentials("demo", "unsigned")
        .await
        .expect("Failed to set credentials");
    manager.set_preview_max_chars(12).await.expect("Failed to set preview");

    let loaded = Settings::load(path).expect("Failed to load settings");
    assert_eq!(loaded.upload.cloud_name, "demo");
    assert_eq!(loaded.upload.upload_preset, "unsigned");
    assert_eq!(loaded.preview_max_chars, 12);
    assert_eq!(manager.get_preview_max_chars().await, 12);
}

#[tokio::test]
async fn test_settings_manager_shared_between_clones() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let manager = SettingsManager::new(temp_file.path()).await.expect("Failed to create manager");
    let clone = manager.clone();

    clone
        .set_database_path("/tmp/other.db".to_string())
        .await
        .expect("Failed to set path");

    assert_eq!(manager.get_database_path().await, "/tmp/other.db");
    assert_eq!(manager.snapshot().await.database_path, "/tmp/other.db");
    assert_eq!(manager.get_settings_path(), temp_file.path().to_string_lossy());
}

#[tokio::test]
async fn test_settings_manager_reload() {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp_file.path();
    let manager = SettingsManager::new(path).await.expect("Failed to create manager");

    let mut on_disk = Settings::default();
    on_disk.preview_max_chars = 40;
    on_disk.save(path).expect("Failed to save settings");

    manager.reload().await.expect("Failed to reload");
    assert_eq!(manager.get_preview_max_chars().await, 40);
}
