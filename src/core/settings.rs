//! Settings persistence
//!
//! Loads and saves [`AnalysisSettings`] as JSON in the user's configuration
//! directory.
//!
//! # File Location
//!
//! `settings.json` under the platform config dir, e.g.
//! `~/.config/xfchess/settings.json` on Linux. Falls back to
//! `./settings.json` when the platform has no config dir.
//!
//! # Error Handling
//!
//! - [`AnalysisSettings::load_or_default`] never fails: a missing or broken
//!   file yields defaults and a warning
//! - [`AnalysisSettings::save_to`] reports failures to the caller

use crate::core::error::SettingsError;
use crate::core::logging::DEFAULT_LOG_FILTER;
use crate::notation::WriteOptions;
use crate::session::JsonFileStore;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SETTINGS_FILENAME: &str = "settings.json";

/// User preferences for the analysis tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// What `export` and `normalize` write
    pub export: WriteOptions,
    /// Where sessions are stored; the platform data dir when unset
    pub session_dir: Option<PathBuf>,
    /// `tracing` filter directive used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            export: WriteOptions::default(),
            session_dir: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AnalysisSettings {
    /// `settings.json` in the user's configuration directory
    pub fn default_path() -> PathBuf {
        match ProjectDirs::from("com", "trilltino", "XFChess") {
            Some(dirs) => dirs.config_dir().join(SETTINGS_FILENAME),
            None => PathBuf::from(SETTINGS_FILENAME),
        }
    }

    /// Read settings from `path`
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Read settings from `path`, falling back to defaults
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("[SETTINGS] No settings file found at {:?}. Using defaults.", path);
            return Self::default();
        }

        match Self::load_from(path) {
            Ok(settings) => {
                info!("[SETTINGS] Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!(
                    "[SETTINGS] Failed to load settings file at {:?}: {}. Using defaults.",
                    path, e
                );
                Self::default()
            }
        }
    }

    /// Write settings to `path`, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("[SETTINGS] Saved settings to {:?}", path);
        Ok(())
    }

    /// Session store honouring [`session_dir`](Self::session_dir)
    pub fn session_store(&self) -> JsonFileStore {
        match &self.session_dir {
            Some(dir) => JsonFileStore::new(dir),
            None => JsonFileStore::default(),
        }
    }
}
