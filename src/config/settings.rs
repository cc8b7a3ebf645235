//! clipcards - Settings module
//!
//! Timing parameters for clipboard access, loaded from a JSON file

use std::fs;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Global settings instance
static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| RwLock::new(Settings::default()));

/// Settings error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Clipboard lock acquisition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Wait per acquisition attempt (milliseconds)
    pub attempt_timeout_ms: u64,
    /// Attempts before giving up with a lock timeout
    pub max_attempts: u32,
    /// Pause between closing the clipboard and unlocking (milliseconds)
    pub release_grace_ms: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: 10,
            max_attempts: 100,
            release_grace_ms: 10,
        }
    }
}

impl LockSettings {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn release_grace(&self) -> Duration {
        Duration::from_millis(self.release_grace_ms)
    }
}

/// Change monitor polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Polling interval (milliseconds)
    pub poll_interval_ms: u64,
    /// Consecutive busy checks tolerated before forcing the lock open
    pub stuck_threshold: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            stuck_threshold: 500,
        }
    }
}

impl MonitorSettings {
    /// Polling interval, never zero
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub lock: LockSettings,
    pub monitor: MonitorSettings,
}

impl Settings {
    /// Load settings from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Get current settings
pub fn get_settings() -> Settings {
    SETTINGS.read().clone()
}

/// Update settings
pub fn update_settings(settings: Settings) {
    *SETTINGS.write() = settings;
}

/// Initialize settings (load from file if one is given and exists)
pub fn init_settings(path: Option<&Path>) -> Result<(), ConfigError> {
    let settings = match path {
        Some(path) if path.exists() => Settings::load(path)?,
        Some(path) => {
            log::info!("Settings file {:?} not found, using defaults", path);
            Settings::default()
        }
        None => Settings::default(),
    };
    update_settings(settings);
    log::info!("Settings initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.lock.attempt_timeout(), Duration::from_millis(10));
        assert_eq!(settings.lock.max_attempts, 100);
        assert_eq!(settings.lock.release_grace(), Duration::from_millis(10));
        assert_eq!(settings.monitor.stuck_threshold, 500);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "lock": {{ "max_attempts": 7 }} }}"#).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.lock.max_attempts, 7);
        assert_eq!(settings.lock.attempt_timeout_ms, 10);
        assert_eq!(settings.monitor, MonitorSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.monitor.poll_interval_ms = 25;
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(Settings::load(file.path()), Err(ConfigError::Json(_))));

        let missing = file.path().with_extension("missing");
        assert!(matches!(Settings::load(&missing), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let settings = MonitorSettings {
            poll_interval_ms: 0,
            ..MonitorSettings::default()
        };
        assert_eq!(settings.poll_interval(), Duration::from_millis(1));
    }
}
