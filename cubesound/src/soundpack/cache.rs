//! Soundpack cache layout
//!
//! ```text
//! <root>/
//!   acceptedurls.txt
//!   deniedurls.txt
//!   <8-hex-digit url hash>/
//!     source.url          exact URL the directory was filled from
//!     soundpack.zip       only while downloading
//!     sounds/ids.txt
//!     sounds/...
//! ```
//!
//! The hash is 32-bit djb2 and can collide. The `source.url` marker detects
//! a collision; the directory is then purged and refilled for the new URL.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

pub const ACCEPTED_FILE: &str = "acceptedurls.txt";
pub const DENIED_FILE: &str = "deniedurls.txt";
pub const MANIFEST_PATH: &str = "sounds/ids.txt";
pub const TEMP_ARCHIVE: &str = "soundpack.zip";
pub const SOURCE_MARKER: &str = "source.url";

/// djb2 over the URL bytes (`h = h * 33 + byte`, seed 5381)
pub fn url_hash(url: &str) -> u32 {
    url.bytes()
        .fold(5381u32, |h, b| h.wrapping_shl(5).wrapping_add(h).wrapping_add(b as u32))
}

/// Cache directory name for a URL: the hash as 8 uppercase hex digits
pub fn cache_dir_name(url: &str) -> String {
    format!("{:08X}", url_hash(url))
}

/// Who a cache directory belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// Marker names this URL
    Ours,
    /// No marker (empty or pre-marker directory)
    Unknown,
    /// Marker names a different URL that hashes the same
    Collision(String),
}

#[derive(Debug, Clone)]
pub struct PackCache {
    root: PathBuf,
}

impl PackCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, url: &str) -> PathBuf {
        self.root.join(cache_dir_name(url))
    }

    pub fn manifest_path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_PATH)
    }

    pub fn temp_archive(dir: &Path) -> PathBuf {
        dir.join(TEMP_ARCHIVE)
    }

    pub fn accepted_list(&self) -> PathBuf {
        self.root.join(ACCEPTED_FILE)
    }

    pub fn denied_list(&self) -> PathBuf {
        self.root.join(DENIED_FILE)
    }

    pub fn ownership(dir: &Path, url: &str) -> Ownership {
        match fs::read_to_string(dir.join(SOURCE_MARKER)) {
            Ok(owner) if owner.trim_end_matches(['\r', '\n']) == url => Ownership::Ours,
            Ok(owner) => Ownership::Collision(owner.trim_end().to_string()),
            Err(_) => Ownership::Unknown,
        }
    }

    pub fn write_marker(dir: &Path, url: &str) -> io::Result<()> {
        fs::write(dir.join(SOURCE_MARKER), url)
    }

    /// Delete everything in a cache directory and recreate it empty
    pub fn purge(dir: &Path) -> io::Result<()> {
        debug!("Purging soundpack cache {}", dir.display());
        match fs::remove_dir_all(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::create_dir_all(dir)
    }
}
