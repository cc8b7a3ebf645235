//! clipcards - Configuration module
//!
//! Process-wide settings for lock acquisition and change monitoring

pub mod settings;

pub use settings::{
    get_settings, init_settings, update_settings, ConfigError, LockSettings, MonitorSettings,
    Settings,
};
