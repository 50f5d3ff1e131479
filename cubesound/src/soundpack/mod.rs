//! Soundpacks: downloadable archives that register custom sound ids
//!
//! A pack is a zip with `sounds/ids.txt` mapping files to ids >= 100. Retrieval
//! flow for a URL:
//!
//! 1. Gate: empty URL, server sounds disabled, or a denied URL → ignored
//! 2. Unknown URL → the [`PackPrompt`] asks the player; nothing else happens
//!    until [`SoundPackPipeline::resolve`] is called with their answer
//! 3. Accepted URL → [`SoundPackPipeline::extract`]
//!
//! Extraction reuses the cache directory when it already holds a valid pack
//! for the same URL, and never touches the network in that case. The id table
//! is replaced wholesale, and only once the new pack fully validated.
//!
//! Every call here blocks on file and network I/O.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::notify::{NoticeLevel, Notifier};

mod cache;
mod manifest;
mod table;
mod transport;
mod urls;


pub use cache::{Ownership, PackCache, cache_dir_name, url_hash};
pub use manifest::{CONTENT_DIR, CUSTOM_SOUND_MIN_ID, ManifestEntry, ManifestError};
pub use table::{CustomSoundEntry, CustomSoundTable};
pub use transport::{HttpTransport, Transport, TransportError};
pub use urls::{UrlList, UrlLists};

/// Chat prefix announcing a soundpack URL
pub const CHAT_TRIGGER: &str = "SOUNDPACK:";

#[derive(Debug, Error)]
pub enum PackError {
    #[error("soundpack URL is empty")]
    EmptyUrl,
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("download failed: {0}")]
    Download(#[from] TransportError),
    #[error("zip extraction failed: {0}")]
    Extract(#[from] zip::result::ZipError),
    #[error("ids.txt not found in soundpack '{}'", cache::MANIFEST_PATH)]
    MissingManifest,
    #[error("failed to parse ids.txt: {0}")]
    Manifest(#[from] ManifestError),
    #[error("soundpack is missing file {0}")]
    MissingFile(String),
}

/// Asks the player whether to download a soundpack
pub trait PackPrompt: Send + Sync {
    fn request(&self, url: &str);
}

/// Prompt that never asks: unknown packs stay pending forever
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl PackPrompt for NoPrompt {
    fn request(&self, url: &str) {
        debug!("No prompt available for soundpack {}", url);
    }
}

/// The player's answer to a [`PackPrompt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    /// Download this time
    Yes,
    /// Download and remember the URL as accepted
    AlwaysYes,
    /// Skip this time
    No,
    /// Skip and remember the URL as denied
    AlwaysNo,
}

/// Why a retrieval request was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyUrl,
    ServerSoundsDisabled,
    Denied,
}

/// What a retrieval request did
#[derive(Debug)]
pub enum RetrieveOutcome {
    Ignored(IgnoreReason),
    /// The player was asked; see [`SoundPackPipeline::resolve`]
    AwaitingDecision,
    /// Extraction ran; `Ok` holds the number of registered ids
    Extracted(Result<usize, PackError>),
}

/// Downloads, caches and registers soundpacks
pub struct SoundPackPipeline {
    cache: PackCache,
    urls: Mutex<UrlLists>,
    transport: Box<dyn Transport>,
    prompt: Box<dyn PackPrompt>,
    notifier: Arc<dyn Notifier>,
    allow_server_sounds: AtomicBool,
    table: RwLock<Arc<CustomSoundTable>>,
}

impl SoundPackPipeline {
    /// Create a pipeline rooted at `cache_root`, loading the URL lists found there
    pub fn new(
        cache_root: &Path,
        transport: Box<dyn Transport>,
        prompt: Box<dyn PackPrompt>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cache = PackCache::new(cache_root);
        let urls = UrlLists::load(cache.accepted_list(), cache.denied_list());
        Self {
            cache,
            urls: Mutex::new(urls),
            transport,
            prompt,
            notifier,
            allow_server_sounds: AtomicBool::new(true),
            table: RwLock::new(Arc::new(CustomSoundTable::empty())),
        }
    }

    pub fn set_allow_server_sounds(&self, allow: bool) {
        self.allow_server_sounds.store(allow, Ordering::SeqCst);
    }

    /// The current id table (a snapshot; later loads do not change it)
    pub fn table(&self) -> Arc<CustomSoundTable> {
        match self.table.read() {
            Ok(table) => table.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&self, table: CustomSoundTable) {
        let table = Arc::new(table);
        match self.table.write() {
            Ok(mut slot) => *slot = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
    }

    fn urls(&self) -> MutexGuard<'_, UrlLists> {
        self.urls.lock().unwrap_or_else(|e| e.into_inner())
    }

    // =========================================================================
    // URL lists
    // =========================================================================

    pub fn has_accepted(&self, url: &str) -> bool {
        self.urls().has_accepted(url)
    }

    pub fn has_denied(&self, url: &str) -> bool {
        self.urls().has_denied(url)
    }

    pub fn accept(&self, url: &str) -> io::Result<()> {
        self.urls().accept(url)
    }

    pub fn deny(&self, url: &str) -> io::Result<()> {
        self.urls().deny(url)
    }

    pub fn clear_denied(&self) -> io::Result<usize> {
        self.urls().clear_denied()
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Handle a server's request to use the pack at `url`
    pub fn retrieve(&self, url: &str) -> RetrieveOutcome {
        if url.is_empty() {
            return RetrieveOutcome::Ignored(IgnoreReason::EmptyUrl);
        }
        if !self.allow_server_sounds.load(Ordering::SeqCst) {
            debug!("Server sounds disabled, ignoring soundpack {}", url);
            return RetrieveOutcome::Ignored(IgnoreReason::ServerSoundsDisabled);
        }
        if self.has_denied(url) {
            debug!("Soundpack {} is denied", url);
            return RetrieveOutcome::Ignored(IgnoreReason::Denied);
        }
        if self.has_accepted(url) {
            return RetrieveOutcome::Extracted(self.extract(url));
        }

        self.prompt.request(url);
        RetrieveOutcome::AwaitingDecision
    }

    /// Apply the player's answer for `url`.
    ///
    /// Returns the extraction result when the answer was to download.
    pub fn resolve(&self, url: &str, choice: PromptChoice) -> Option<Result<usize, PackError>> {
        let remember = match choice {
            PromptChoice::AlwaysYes => self.accept(url),
            PromptChoice::AlwaysNo => self.deny(url),
            PromptChoice::Yes | PromptChoice::No => Ok(()),
        };
        if let Err(e) = remember {
            warn!("Failed to save soundpack URL list: {}", e);
        }

        match choice {
            PromptChoice::Yes | PromptChoice::AlwaysYes => Some(self.extract(url)),
            PromptChoice::No | PromptChoice::AlwaysNo => None,
        }
    }

    /// Download (or reuse from cache), extract, validate and register a pack.
    ///
    /// The previous table is retired first; the new one is published only on
    /// success. Returns the number of registered ids.
    pub fn extract(&self, url: &str) -> Result<usize, PackError> {
        if url.is_empty() {
            return Err(PackError::EmptyUrl);
        }
        let dir = self.cache.dir_for(url);
        fs::create_dir_all(&dir)?;

        self.publish(CustomSoundTable::empty());

        match self.load_cached(url, &dir) {
            Ok(Some(table)) => {
                let count = table.len();
                self.publish(table);
                info!("Soundpack {} loaded from cache ({} sounds)", url, count);
                self.notify(NoticeLevel::Info, "Soundpack already cached and loaded.");
                return Ok(count);
            }
            Ok(None) => {}
            Err(e) => warn!("Cached soundpack for {} is unusable ({}), downloading", url, e),
        }

        match self.download_and_register(url, &dir) {
            Ok(table) => {
                let count = table.len();
                self.publish(table);
                self.notify(
                    NoticeLevel::Info,
                    "Soundpack extracted and registered successfully.",
                );
                Ok(count)
            }
            Err(e) => {
                warn!("Soundpack {} failed: {}", url, e);
                Err(e)
            }
        }
    }

    /// Cache-hit path: `Ok(None)` means there is nothing usable to reuse
    fn load_cached(&self, url: &str, dir: &Path) -> Result<Option<CustomSoundTable>, PackError> {
        match PackCache::ownership(dir, url) {
            Ownership::Collision(owner) => {
                warn!(
                    "Soundpack cache {} belongs to {}, purging for {}",
                    dir.display(),
                    owner,
                    url
                );
                PackCache::purge(dir)?;
                return Ok(None);
            }
            Ownership::Ours | Ownership::Unknown => {}
        }

        let manifest = PackCache::manifest_path(dir);
        if !manifest.is_file() {
            return Ok(None);
        }
        let table = build_table(dir)?;
        PackCache::write_marker(dir, url)?;
        Ok(Some(table))
    }

    fn download_and_register(&self, url: &str, dir: &Path) -> Result<CustomSoundTable, PackError> {
        let archive = PackCache::temp_archive(dir);

        self.notify(NoticeLevel::Info, &format!("Downloading {} ...", url));
        if let Err(e) = self.transport.download(url, &archive) {
            let _ = fs::remove_file(&archive);
            self.notify(NoticeLevel::Error, "Download failed");
            return Err(e.into());
        }

        let extracted = extract_archive(&archive, dir);
        let _ = fs::remove_file(&archive);
        if let Err(e) = extracted {
            self.notify(NoticeLevel::Error, "Failed to extract soundpack zip.");
            return Err(e);
        }
        PackCache::write_marker(dir, url)?;

        if !PackCache::manifest_path(dir).is_file() {
            self.notify(
                NoticeLevel::Error,
                "ids.txt not found in soundpack 'sounds/ids.txt'",
            );
            return Err(PackError::MissingManifest);
        }

        build_table(dir).inspect_err(|e| match e {
            PackError::Manifest(inner) => {
                self.notify(NoticeLevel::Error, &format!("Failed to parse ids.txt: {}", inner))
            }
            PackError::MissingFile(file) => {
                self.notify(NoticeLevel::Error, &format!("Soundpack is missing file {}", file));
                self.notify(NoticeLevel::Error, "Validation failed for soundpack files.");
            }
            other => self.notify(NoticeLevel::Error, &other.to_string()),
        })
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notifier.notify(level, &format!("[SoundPack] {}", message));
    }
}

fn extract_archive(archive: &Path, dir: &Path) -> Result<(), PackError> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))?;
    zip.extract(dir)?;
    Ok(())
}

/// Parse and validate the manifest of an extracted pack.
///
/// Every referenced file must exist; one missing file rejects the pack.
fn build_table(dir: &Path) -> Result<CustomSoundTable, PackError> {
    let text = fs::read_to_string(PackCache::manifest_path(dir))?;
    let entries = manifest::parse(&text)?;

    if let Some(missing) = entries.iter().find(|entry| !dir.join(&entry.path).is_file()) {
        return Err(PackError::MissingFile(missing.path.clone()));
    }
    Ok(CustomSoundTable::from_manifest(dir, &entries))
}

/// Extract the URL from a `SOUNDPACK:<url>` chat message
pub fn parse_chat_trigger(message: &str) -> Option<&str> {
    message.strip_prefix(CHAT_TRIGGER)
}
