//! Custom sound table: ids >= 100 registered by a soundpack
//!
//! The table is immutable once published. Clips are decoded on first play
//! and cached in their entry; a file that fails to decode stays silent.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::board::Sound;
use crate::music::{TrackOpener, decode_to_end};

use super::manifest::ManifestEntry;

/// One registered custom sound
#[derive(Debug)]
pub struct CustomSoundEntry {
    pub id: u16,
    /// Path relative to the pack root
    pub relative: String,
    /// Absolute location inside the cache directory
    pub path: PathBuf,
    sound: OnceLock<Option<Sound>>,
}

impl CustomSoundEntry {
    pub fn new(id: u16, relative: String, path: PathBuf) -> Self {
        Self {
            id,
            relative,
            path,
            sound: OnceLock::new(),
        }
    }

    /// Whether a decode has been attempted
    pub fn loaded(&self) -> bool {
        self.sound.get().is_some()
    }

    /// Decoded clip, decoding it on first use
    pub fn sound(&self, opener: &dyn TrackOpener) -> Option<&Sound> {
        self.sound
            .get_or_init(|| match decode_file(&self.path, opener) {
                Ok(sound) => {
                    debug!("[SoundPack] Loaded custom sound {} (id {})", self.relative, self.id);
                    Some(sound)
                }
                Err(message) => {
                    warn!(
                        "[SoundPack] Failed to decode {} (id {}): {}",
                        self.relative, self.id, message
                    );
                    None
                }
            })
            .as_ref()
    }
}

fn decode_file(path: &Path, opener: &dyn TrackOpener) -> Result<Sound, String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("wav") => {
            let file = File::open(path).map_err(|e| e.to_string())?;
            let wav = cubesound_wav::decode_wav(BufReader::new(file)).map_err(|e| e.to_string())?;
            Ok(Sound::from(wav))
        }
        Some("ogg") => {
            let mut decoder = opener.open(path).map_err(|e| e.to_string())?;
            let samples = decode_to_end(decoder.as_mut()).map_err(|e| e.to_string())?;
            Ok(Sound {
                channels: decoder.channels(),
                sample_rate: decoder.sample_rate(),
                data: Arc::new(samples),
            })
        }
        _ => Err("unsupported file type".to_string()),
    }
}

/// Id to entry mapping for the currently loaded pack
#[derive(Debug, Default)]
pub struct CustomSoundTable {
    entries: HashMap<u16, CustomSoundEntry>,
}

impl CustomSoundTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from manifest entries; the first entry for an id wins
    pub fn from_manifest(root: &Path, manifest: &[ManifestEntry]) -> Self {
        let mut entries = HashMap::with_capacity(manifest.len());
        for entry in manifest {
            entries.entry(entry.id).or_insert_with(|| {
                CustomSoundEntry::new(entry.id, entry.path.clone(), root.join(&entry.path))
            });
        }
        Self { entries }
    }

    pub fn get(&self, id: u16) -> Option<&CustomSoundEntry> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered ids in ascending order
    pub fn ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
