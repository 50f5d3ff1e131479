//! Audio configuration (`audio.toml` in the platform config directory)
//!
//! Volumes, music delays, soundpack policy and asset locations. Stored as TOML;
//! missing fields fall back to their defaults, out-of-range values are clamped.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted inter-track delay, in seconds
pub const MAX_MUSIC_DELAY_SECS: u32 = 3600;

/// Largest volume value (percent)
pub const MAX_VOLUME: u8 = 100;

const CONFIG_FILE: &str = "audio.toml";

/// Audio subsystem configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sound effect volume (default: 100, range: 0-100, 0 disables sounds)
    #[serde(default = "default_volume")]
    pub sounds_volume: u8,
    /// Music volume (default: 100, range: 0-100, 0 disables music)
    #[serde(default = "default_volume")]
    pub music_volume: u8,
    /// Shortest pause between music tracks (default: 120, range: 0-3600)
    #[serde(default = "default_min_delay")]
    pub min_music_delay_secs: u32,
    /// Longest pause between music tracks (default: 420, range: 0-3600)
    #[serde(default = "default_max_delay")]
    pub max_music_delay_secs: u32,
    /// Whether servers may push soundpacks (default: true)
    #[serde(default = "default_true")]
    pub allow_server_sounds: bool,
    /// Root of the music track tree (default: `audio`)
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
    /// Sound effect archive (default: `audio/default.zip`)
    #[serde(default = "default_sound_archive")]
    pub default_sound_archive: PathBuf,
    /// Archive used when the default one is missing (default: `audio/classicube.zip`)
    #[serde(default = "default_fallback_archive")]
    pub fallback_sound_archive: PathBuf,
    /// Root of the per-URL soundpack cache (default: `soundpackcache`)
    #[serde(default = "default_cache_dir")]
    pub soundpack_cache_dir: PathBuf,
}

fn default_volume() -> u8 {
    MAX_VOLUME
}
fn default_min_delay() -> u32 {
    120
}
fn default_max_delay() -> u32 {
    420
}
fn default_true() -> bool {
    true
}
fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio")
}
fn default_sound_archive() -> PathBuf {
    PathBuf::from("audio/default.zip")
}
fn default_fallback_archive() -> PathBuf {
    PathBuf::from("audio/classicube.zip")
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("soundpackcache")
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sounds_volume: default_volume(),
            music_volume: default_volume(),
            min_music_delay_secs: default_min_delay(),
            max_music_delay_secs: default_max_delay(),
            allow_server_sounds: default_true(),
            audio_dir: default_audio_dir(),
            default_sound_archive: default_sound_archive(),
            fallback_sound_archive: default_fallback_archive(),
            soundpack_cache_dir: default_cache_dir(),
        }
    }
}

impl AudioConfig {
    /// Clamp every numeric field into its valid range.
    ///
    /// A maximum delay below the minimum is raised to the minimum.
    pub fn sanitized(mut self) -> Self {
        self.sounds_volume = self.sounds_volume.min(MAX_VOLUME);
        self.music_volume = self.music_volume.min(MAX_VOLUME);
        self.min_music_delay_secs = self.min_music_delay_secs.min(MAX_MUSIC_DELAY_SECS);
        self.max_music_delay_secs = self
            .max_music_delay_secs
            .clamp(self.min_music_delay_secs, MAX_MUSIC_DELAY_SECS);
        self
    }

    /// Loads `audio.toml` from the platform configuration directory.
    ///
    /// Returns default values if the file doesn't exist or cannot be parsed.
    pub fn load() -> Self {
        config_dir()
            .map(|dir| Self::load_from(&dir.join(CONFIG_FILE)))
            .unwrap_or_default()
    }

    /// Loads a configuration file from an explicit path, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str::<AudioConfig>(&content).ok())
            .unwrap_or_default()
            .sanitized()
    }

    /// Saves to the platform configuration directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self) -> std::io::Result<()> {
        match config_dir() {
            Some(dir) => self.save_to(&dir.join(CONFIG_FILE)),
            None => Ok(()),
        }
    }

    /// Saves to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, content)
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Linux: `~/.config/cubesound`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.cubesound", "", "cubesound")
        .map(|dirs| dirs.config_dir().to_path_buf())
}
