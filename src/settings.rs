//! Persisted user settings shared by the players.
//!
//! Only the player volume lives here today. Writes are best effort: a failed
//! save is logged and the in-memory value stays authoritative.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::ConfigError;

/// Volume used when nothing has been saved yet (0.0 - 1.0).
pub const DEFAULT_VOLUME: f64 = 0.5;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct StoredSettings {
    volume: f64,
}

impl Default for StoredSettings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
        }
    }
}

pub struct Settings {
    path: Option<PathBuf>,
    stored: RwLock<StoredSettings>,
}

impl Settings {
    /// Settings that never touch the disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            stored: RwLock::new(StoredSettings::default()),
        }
    }

    /// Loads settings from `path`, starting from defaults when the file is
    /// missing or unreadable.
    pub fn open(path: PathBuf) -> Self {
        let stored = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("[Settings] Ignoring corrupt {}: {}", path.display(), e);
                StoredSettings::default()
            }),
            Err(_) => StoredSettings::default(),
        };

        Self {
            path: Some(path),
            stored: RwLock::new(stored),
        }
    }

    pub fn saved_volume(&self) -> f64 {
        self.stored.read().volume
    }

    pub fn save_volume(&self, volume: f64) {
        self.stored.write().volume = volume.clamp(0.0, 1.0);
        if let Err(e) = self.persist() {
            log::warn!("[Settings] Failed to save volume: {}", e);
        }
    }

    fn persist(&self) -> Result<(), ConfigError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&*self.stored.read())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::in_memory()
    }
}
