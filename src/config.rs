use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use anyhow::Context;
use tracing::{info, warn};

use crate::audio::playback::DEFAULT_CAPACITY_FRAMES;
use crate::library::DiskLibrary;
use crate::services::suno::client::DEFAULT_BASE_URL;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub upload_base_url: String,
    pub poll_interval_ms: u64,
    pub max_poll_secs: u64,
    /// Consecutive failed polls tolerated before the job is failed.
    pub max_poll_errors: u32,
    pub request_timeout_secs: u64,
    pub library_dir: PathBuf,
    pub playback_capacity_frames: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            upload_base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 800,
            max_poll_secs: 15 * 60,
            max_poll_errors: 5,
            request_timeout_secs: 60,
            library_dir: DiskLibrary::default_dir(),
            playback_capacity_frames: DEFAULT_CAPACITY_FRAMES,
        }
    }
}

/// `settings.json` under the platform config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("songforge")
        .join("settings.json")
}

impl Settings {
    /// The settings file at [`default_config_path`], then `SONGFORGE_*` environment overrides.
    pub fn from_env() -> Self {
        Self::load(&default_config_path()).with_overrides(|key| std::env::var(key).ok())
    }

    /// Defaults plus overrides, with no file involved.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::default().with_overrides(lookup)
    }

    /// Reads a JSON settings file. Missing keys keep their defaults; a missing
    /// or unreadable file yields [`Settings::default`].
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings file at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read settings from {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str::<Self>(&contents) {
            Ok(settings) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Failed to parse settings in {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Writes the settings as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), anyhow::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))?;
        Ok(())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("SONGFORGE_API_BASE") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("SONGFORGE_UPLOAD_BASE") {
            self.upload_base_url = v;
        }
        if let Some(v) = lookup("SONGFORGE_LIBRARY_DIR") {
            self.library_dir = PathBuf::from(v);
        }
        parse_into(&lookup, "SONGFORGE_POLL_INTERVAL_MS", &mut self.poll_interval_ms);
        parse_into(&lookup, "SONGFORGE_MAX_POLL_SECS", &mut self.max_poll_secs);
        parse_into(&lookup, "SONGFORGE_MAX_POLL_ERRORS", &mut self.max_poll_errors);
        parse_into(&lookup, "SONGFORGE_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs);
        parse_into(&lookup, "SONGFORGE_PLAYBACK_FRAMES", &mut self.playback_capacity_frames);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_duration(&self) -> Duration {
        Duration::from_secs(self.max_poll_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_into<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(v) => *slot = v,
            Err(_) => warn!("Ignoring {}={:?}: not a number", key, raw),
        }
    }
}

/// The only state that survives a reload: the API key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub api_key: String,
}

impl PersistedState {
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Empty or unreadable state restores to the default.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::default();
        }
        serde_json::from_slice(bytes).unwrap_or_else(|e| {
            warn!("Discarding unreadable plugin state: {}", e);
            Self::default()
        })
    }
}
