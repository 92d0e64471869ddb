//! Configuration
//!
//! - `settings` - JSON settings file with environment overrides
//! - `settings_manager` - shared, auto-saving settings handle

pub mod settings;
pub mod settings_manager;

pub use settings::{Settings, UploadSettings};
pub use settings_manager::SettingsManager;
