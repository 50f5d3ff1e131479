//! Sound archive loading
//!
//! Fills the dig/step boards from a zip archive. Each entry is resolved in
//! this order:
//!
//! 1. `sounds` / `sounds.txt`: the mapping file, parsed into a [`CustomSoundMap`]
//!    that applies to the entries after it.
//! 2. Entries named in the mapping go straight to the mapped group id; the
//!    `dig_`/`step_` prefix still selects the board.
//! 3. Everything else must be `dig_<group>[digit]` or `step_<group>[digit]`.
//!
//! Per-entry problems are reported and skipped. Only failing to open or walk
//! the archive itself is an error.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;

use hashbrown::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::board::{BOARD_GROUPS, BoardKind, Boards, GROUP_CAPACITY, Sound, find_group};
use crate::notify::{NoticeLevel, Notifier};

/// Entry names (after stripping directory and extension) treated as the mapping file
pub const MAPPING_FILE_NAMES: [&str; 2] = ["sounds", "sounds.txt"];

/// Largest id a mapping line may carry
pub const MAX_MAPPED_ID: u32 = 0xFFFF;

/// Errors that abort loading a whole sound archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open sound archive: {0}")]
    Io(#[from] io::Error),
    #[error("failed to read sound archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ArchiveError {
    /// Whether the archive file simply does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            ArchiveError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            ArchiveError::Zip(zip::result::ZipError::Io(e)) => e.kind() == io::ErrorKind::NotFound,
            ArchiveError::Zip(_) => false,
        }
    }
}

// =============================================================================
// Mapping file
// =============================================================================

/// Case-insensitive file name to group id mapping, scoped to one archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomSoundMap {
    entries: HashMap<String, u16>,
}

impl CustomSoundMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name = id` lines into the map.
    ///
    /// Blank lines and lines starting with `#` or `/` are ignored, as are lines
    /// without `=`, with an empty side, or with an id outside 1-65535.
    /// Returns the number of accepted lines.
    pub fn parse_into(&mut self, text: &str) -> usize {
        let mut accepted = 0;
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with('/') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                debug!("Ignoring mapping line without '=': {}", line);
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match value.parse::<u32>() {
                Ok(id @ 1..=MAX_MAPPED_ID) if !key.is_empty() => {
                    self.insert(key, id as u16);
                    accepted += 1;
                }
                _ => debug!("Ignoring mapping line: {}", line),
            }
        }
        accepted
    }

    /// Map a file name to a group id; a later insert for the same name wins
    pub fn insert(&mut self, name: &str, id: u16) {
        self.entries.insert(normalize(name), id);
    }

    /// Look up an entry by its stem, then by the stem without its board prefix
    pub fn lookup(&self, stem: &str) -> Option<u16> {
        let stem = stem.to_ascii_lowercase();
        if let Some(&id) = self.entries.get(&stem) {
            return Some(id);
        }
        BoardKind::from_prefixed(&stem).and_then(|(_, rest)| self.entries.get(rest).copied())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(name: &str) -> String {
    entry_stem(name).to_ascii_lowercase()
}

/// Strip directories and the extension from an archive entry name
pub fn entry_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    }
}

/// Resolve `<group>[digit]` (already prefix-stripped) to a group name.
///
/// Exactly one trailing ASCII digit is removed: `pling1` and `pling` give
/// `pling`, `pling12` gives `pling1`.
pub fn strip_variant_digit(name: &str) -> &str {
    match name.as_bytes().last() {
        Some(b) if b.is_ascii_digit() => &name[..name.len() - 1],
        _ => name,
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Result of loading one archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Clips added to a board
    pub loaded: usize,
    /// Mapping lines accepted
    pub mappings: usize,
    /// Entries that were reported and skipped
    pub skipped: Vec<String>,
}

/// Load every entry of a zip archive into the boards.
///
/// The mapping state lives only for this call.
pub fn load_archive<R: Read + Seek>(
    reader: R,
    boards: &mut Boards,
    notifier: &dyn Notifier,
) -> Result<LoadReport, ArchiveError> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut pass = ArchivePass {
        boards,
        notifier,
        map: CustomSoundMap::new(),
        report: LoadReport::default(),
    };

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let path = entry.name().to_string();
        pass.process_entry(&path, &mut entry);
    }

    Ok(pass.report)
}

/// Load a sound archive from disk
pub fn load_file(
    path: &Path,
    boards: &mut Boards,
    notifier: &dyn Notifier,
) -> Result<LoadReport, ArchiveError> {
    let file = File::open(path)?;
    let report = load_archive(BufReader::new(file), boards, notifier)?;
    info!(
        "Loaded {} sounds from {} ({} skipped)",
        report.loaded,
        path.display(),
        report.skipped.len()
    );
    Ok(report)
}

/// Load the default archive, or the fallback when the default does not exist.
///
/// Any other failure is logged and not retried with the fallback.
pub fn load_default(
    primary: &Path,
    fallback: &Path,
    boards: &mut Boards,
    notifier: &dyn Notifier,
) -> Result<LoadReport, ArchiveError> {
    let result = match load_file(primary, boards, notifier) {
        Err(e) if e.is_not_found() => {
            debug!("{} not found, trying {}", primary.display(), fallback.display());
            load_file(fallback, boards, notifier)
        }
        other => other,
    };
    if let Err(e) = &result {
        warn!("Failed to load sound archive: {}", e);
    }
    result
}

struct ArchivePass<'a> {
    boards: &'a mut Boards,
    notifier: &'a dyn Notifier,
    map: CustomSoundMap,
    report: LoadReport,
}

impl ArchivePass<'_> {
    fn process_entry(&mut self, path: &str, reader: &mut dyn Read) {
        let stem = entry_stem(path);
        let lower = stem.to_ascii_lowercase();

        if MAPPING_FILE_NAMES.contains(&lower.as_str()) {
            self.parse_mapping(path, reader);
            return;
        }

        if let Some(group) = self.map.lookup(&lower) {
            self.load_mapped(path, &lower, group, reader);
            return;
        }

        let Some((kind, rest)) = BoardKind::from_prefixed(&lower) else {
            debug!("Skipping {}: not a dig_/step_ sound", path);
            self.report.skipped.push(path.to_string());
            return;
        };
        let name = strip_variant_digit(rest);
        let Some(group) = find_group(name) else {
            self.skip(path, format!("Unknown sound group '{}'", name));
            return;
        };
        self.decode_into(kind, group, path, reader);
    }

    fn parse_mapping(&mut self, path: &str, reader: &mut dyn Read) {
        let mut bytes = Vec::new();
        if let Err(e) = reader.read_to_end(&mut bytes) {
            warn!("Failed to read {}: {}", path, e);
        }
        let accepted = self.map.parse_into(&String::from_utf8_lossy(&bytes));
        debug!("{} custom sound mappings from {}", accepted, path);
        self.report.mappings += accepted;
    }

    fn load_mapped(&mut self, path: &str, lower: &str, group: u16, reader: &mut dyn Read) {
        if group as usize >= BOARD_GROUPS {
            self.skip(
                path,
                format!("Custom sound mapping for {} uses id {} (out of range)", path, group),
            );
            return;
        }
        let Some((kind, _)) = BoardKind::from_prefixed(lower) else {
            self.skip(
                path,
                format!("Custom sound file {} not prefixed with dig_/step_", path),
            );
            return;
        };
        self.decode_into(kind, group, path, reader);
    }

    fn decode_into(&mut self, kind: BoardKind, group: u16, path: &str, reader: &mut dyn Read) {
        let board = self.boards.get_mut(kind);
        if board.is_full(group) {
            self.skip(
                path,
                format!("Cannot have more than {} sounds in a group", GROUP_CAPACITY),
            );
            return;
        }

        match cubesound_wav::decode_wav(reader) {
            Ok(wav) => match board.add(group, Sound::from(wav)) {
                Ok(()) => self.report.loaded += 1,
                Err(e) => self.skip(path, e.to_string()),
            },
            Err(e) => self.skip(path, format!("Error decoding sound {}: {}", path, e)),
        }
    }

    fn skip(&mut self, path: &str, message: String) {
        warn!("{}: {}", path, message);
        self.notifier.notify(NoticeLevel::Warning, &message);
        self.report.skipped.push(path.to_string());
    }
}
