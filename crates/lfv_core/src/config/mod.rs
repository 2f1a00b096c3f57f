//! Configuration management for the longform video assembler.
//!
//! This module provides:
//! - TOML-based configuration with one section per pipeline stage
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use lfv_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Music level: {}", config.settings().audio.music_level);
//!
//! config.settings_mut().audio.music_level = 0.2;
//! config.update_section(ConfigSection::Audio).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    AudioSettings, ConfigSection, FittingSettings, GenerationSettings, LoggingSettings,
    OverlaySettings, PathSettings, RenderSettings, Settings, TimelineSettings, TimingSettings,
};
