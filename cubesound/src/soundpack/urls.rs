//! Persisted accepted/denied soundpack URLs
//!
//! Each list is a text file with one `<url> ` line per entry (key, a space,
//! and an empty value).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// One persisted URL list
#[derive(Debug, Clone)]
pub struct UrlList {
    path: PathBuf,
    urls: Vec<String>,
}

impl UrlList {
    /// Load from disk; a missing or unreadable file is an empty list
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let urls = match fs::read_to_string(&path) {
            Ok(text) => text
                .lines()
                .filter_map(|line| {
                    let key = line.split(' ').next().unwrap_or("").trim_end_matches('\r');
                    (!key.is_empty()).then(|| key.to_string())
                })
                .collect(),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {}", path.display(), e);
                }
                Vec::new()
            }
        };
        Self { path, urls }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|u| u == url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Add and persist; returns whether the list changed
    pub fn insert(&mut self, url: &str) -> io::Result<bool> {
        if self.contains(url) {
            return Ok(false);
        }
        self.urls.push(url.to_string());
        self.save()?;
        Ok(true)
    }

    /// Remove and persist; returns whether the list changed
    pub fn remove(&mut self, url: &str) -> io::Result<bool> {
        let before = self.urls.len();
        self.urls.retain(|u| u != url);
        if self.urls.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Empty and persist; returns how many entries were dropped
    pub fn clear(&mut self) -> io::Result<usize> {
        let count = self.urls.len();
        self.urls.clear();
        self.save()?;
        Ok(count)
    }

    fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        for url in &self.urls {
            text.push_str(url);
            text.push_str(" \n");
        }
        fs::write(&self.path, text)
    }
}

/// The accepted and denied lists together.
///
/// A URL is never on both: accepting removes it from the denied list and
/// denying removes it from the accepted list.
#[derive(Debug, Clone)]
pub struct UrlLists {
    accepted: UrlList,
    denied: UrlList,
}

impl UrlLists {
    pub fn load(accepted: impl Into<PathBuf>, denied: impl Into<PathBuf>) -> Self {
        Self {
            accepted: UrlList::load(accepted),
            denied: UrlList::load(denied),
        }
    }

    pub fn has_accepted(&self, url: &str) -> bool {
        self.accepted.contains(url)
    }

    pub fn has_denied(&self, url: &str) -> bool {
        self.denied.contains(url)
    }

    pub fn accept(&mut self, url: &str) -> io::Result<()> {
        self.denied.remove(url)?;
        self.accepted.insert(url)?;
        Ok(())
    }

    pub fn deny(&mut self, url: &str) -> io::Result<()> {
        self.accepted.remove(url)?;
        self.denied.insert(url)?;
        Ok(())
    }

    /// Forget every denied URL; returns how many there were
    pub fn clear_denied(&mut self) -> io::Result<usize> {
        self.denied.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lists(dir: &TempDir) -> UrlLists {
        UrlLists::load(dir.path().join("acceptedurls.txt"), dir.path().join("deniedurls.txt"))
    }

    #[test]
    fn test_accept_persists() {
        let dir = TempDir::new().unwrap();
        let mut urls = lists(&dir);
        urls.accept("http://a/pack.zip").unwrap();
        assert!(urls.has_accepted("http://a/pack.zip"));
        assert!(!urls.has_denied("http://a/pack.zip"));

        let reloaded = lists(&dir);
        assert!(reloaded.has_accepted("http://a/pack.zip"));
        assert!(!reloaded.has_denied("http://a/pack.zip"));
        assert_eq!(
            fs::read_to_string(dir.path().join("acceptedurls.txt")).unwrap(),
            "http://a/pack.zip \n"
        );
    }

    #[test]
    fn test_deny_overrides_accept() {
        let dir = TempDir::new().unwrap();
        let mut urls = lists(&dir);
        urls.accept("u1").unwrap();
        urls.deny("u1").unwrap();
        assert!(urls.has_denied("u1"));
        assert!(!urls.has_accepted("u1"));

        let reloaded = lists(&dir);
        assert!(reloaded.has_denied("u1"));
        assert!(!reloaded.has_accepted("u1"));
    }

    #[test]
    fn test_clear_denied() {
        let dir = TempDir::new().unwrap();
        let mut urls = lists(&dir);
        urls.deny("u1").unwrap();
        urls.deny("u2").unwrap();
        urls.deny("u2").unwrap();
        assert_eq!(urls.clear_denied().unwrap(), 2);
        assert!(!urls.has_denied("u1"));
        assert!(!lists(&dir).has_denied("u2"));
    }

    #[test]
    fn test_load_ignores_values_and_blank_lines() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("acceptedurls.txt"),
            "http://x \r\n\nhttp://y something\n",
        )
        .unwrap();
        let urls = lists(&dir);
        assert!(urls.has_accepted("http://x"));
        assert!(urls.has_accepted("http://y"));
        assert_eq!(urls.accepted.len(), 2);
    }
}
