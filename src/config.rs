use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::input::Command;
use crate::players::book::BookLayout;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playhost")
}

pub fn get_config_file_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE_NAME)
}

pub fn get_settings_file_path() -> PathBuf {
    get_config_dir().join(SETTINGS_FILE_NAME)
}

/// Runtime configuration. Every field has a default so a partial file is valid.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Commands that fire at most once per `rate_limit_window_ms`.
    pub rate_limited: Vec<Command>,
    pub rate_limit_window_ms: u64,

    pub fast_forward_ms: u64,
    pub rewind_ms: u64,

    /// Fade audio out when a player is stopped for good.
    pub enable_fade_out: bool,

    pub slideshow_interval_ms: u64,
    pub osd_hide_delay_ms: u64,

    /// Characters per generated e-book location.
    pub book_location_chars: usize,
    /// `scrolled` suits small screens.
    pub book_layout: BookLayout,

    /// Base url of the media server, used to build download urls.
    pub server_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rate_limited: vec![Command::Stop],
            rate_limit_window_ms: 1000,
            fast_forward_ms: 30_000,
            rewind_ms: 10_000,
            enable_fade_out: true,
            slideshow_interval_ms: 11_000,
            osd_hide_delay_ms: 3000,
            book_location_chars: 1024,
            book_layout: BookLayout::Paginated,
            server_url: "http://localhost:8096".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn rate_limited_set(&self) -> HashSet<Command> {
        self.rate_limited.iter().copied().collect()
    }
}

/// Loads the user's configuration, falling back to defaults.
pub fn load_config() -> AppConfig {
    let path = get_config_file_path();
    if !path.exists() {
        log::info!("[Config] No config at {}, using defaults", path.display());
        return AppConfig::default();
    }

    match AppConfig::load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("[Config] Ignoring {}: {}", path.display(), e);
            AppConfig::default()
        }
    }
}
