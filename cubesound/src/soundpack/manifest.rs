//! Soundpack manifest (`sounds/ids.txt`)
//!
//! One `relative/path = id` pair per line, id in 100-65535. Unlike the
//! in-archive mapping file, parsing is all-or-nothing: one bad line rejects
//! the whole manifest.

use std::path::{Component, Path};

use thiserror::Error;

/// Lowest id a soundpack may register
pub const CUSTOM_SOUND_MIN_ID: u16 = 100;

/// Folder inside a pack that holds the sound files
pub const CONTENT_DIR: &str = "sounds/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("ids.txt is empty")]
    Empty,
    #[error("invalid line {line} in ids.txt (missing '=')")]
    MissingEquals { line: usize },
    #[error("invalid line {line} in ids.txt (empty name/id)")]
    EmptyField { line: usize },
    #[error("sound id '{value}' on line {line} is invalid: must be {min}-65535", min = CUSTOM_SOUND_MIN_ID)]
    InvalidId { line: usize, value: String },
    #[error("path '{path}' on line {line} escapes the soundpack")]
    UnsafePath { line: usize, path: String },
}

/// One `path = id` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path relative to the pack root, always under [`CONTENT_DIR`]
    pub path: String,
    pub id: u16,
}

/// Parse a manifest. Blank lines are skipped; every other line must be valid.
pub fn parse(text: &str) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut entries = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (name, value) = trimmed
            .split_once('=')
            .ok_or(ManifestError::MissingEquals { line })?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return Err(ManifestError::EmptyField { line });
        }

        let id = value
            .parse::<u16>()
            .ok()
            .filter(|id| *id >= CUSTOM_SOUND_MIN_ID)
            .ok_or_else(|| ManifestError::InvalidId {
                line,
                value: value.to_string(),
            })?;

        entries.push(ManifestEntry {
            path: content_path(name, line)?,
            id,
        });
    }

    if entries.is_empty() {
        return Err(ManifestError::Empty);
    }
    Ok(entries)
}

/// Prefix `sounds/` when missing and reject paths leaving the pack
fn content_path(name: &str, line: usize) -> Result<String, ManifestError> {
    let name = name.replace('\\', "/");
    let safe = Path::new(&name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(ManifestError::UnsafePath { line, path: name });
    }
    if name.starts_with(CONTENT_DIR) {
        Ok(name)
    } else {
        Ok(format!("{}{}", CONTENT_DIR, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let entries = parse("boom.ogg = 100\n\n  sounds/zap.wav=65535  \r\n").unwrap();
        assert_eq!(
            entries,
            vec![
                ManifestEntry {
                    path: "sounds/boom.ogg".into(),
                    id: 100
                },
                ManifestEntry {
                    path: "sounds/zap.wav".into(),
                    id: 65535
                },
            ]
        );
    }

    #[test]
    fn test_one_bad_line_rejects_all() {
        assert_eq!(
            parse("a.ogg = 101\nfoo.ogg 100\nb.ogg = 102\n"),
            Err(ManifestError::MissingEquals { line: 2 })
        );
    }

    #[test]
    fn test_id_range() {
        assert!(matches!(
            parse("a.ogg = 99"),
            Err(ManifestError::InvalidId { line: 1, .. })
        ));
        assert!(matches!(
            parse("a.ogg = 65536"),
            Err(ManifestError::InvalidId { .. })
        ));
        assert!(matches!(
            parse("a.ogg = loud"),
            Err(ManifestError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_empty_fields_and_files() {
        assert_eq!(parse(" = 100"), Err(ManifestError::EmptyField { line: 1 }));
        assert_eq!(parse("a.ogg ="), Err(ManifestError::EmptyField { line: 1 }));
        assert_eq!(parse("\n  \n"), Err(ManifestError::Empty));
    }

    #[test]
    fn test_rejects_escaping_paths() {
        assert!(matches!(
            parse("../../evil.ogg = 100"),
            Err(ManifestError::UnsafePath { .. })
        ));
        assert!(matches!(
            parse("/etc/passwd = 100"),
            Err(ManifestError::UnsafePath { .. })
        ));
    }
}
