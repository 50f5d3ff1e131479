//! Blocking file download for soundpacks

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

/// Download timeout (packs are small; this bounds a stuck transfer)
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("download failed with HTTP {0}")]
    Status(u16),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Fetches a URL into a local file, blocking the calling thread
pub trait Transport: Send + Sync {
    /// Returns the number of bytes written
    fn download(&self, url: &str, dest: &Path) -> Result<u64, TransportError>;
}

/// HTTP(S) downloads through `reqwest` on a single-threaded tokio runtime
#[derive(Debug, Clone)]
pub struct HttpTransport {
    timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            timeout: DOWNLOAD_TIMEOUT,
        }
    }
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn download_async(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        let bytes = response.bytes().await?;
        debug!("Received {} bytes from {}", bytes.len(), url);

        fs::write(dest, &bytes)?;
        Ok(bytes.len() as u64)
    }
}

impl Transport for HttpTransport {
    fn download(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let written = rt.block_on(self.download_async(url, dest))?;
        info!("Downloaded {} ({} bytes)", url, written);
        Ok(written)
    }
}
