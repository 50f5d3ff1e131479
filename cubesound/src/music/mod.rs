//! Background music streaming
//!
//! One worker thread plays random tracks from the music directory with a random
//! pause between them. The foreground only talks to it through [`MusicShared`]:
//! scalar flags and the live volume, plus a condition variable that wakes the
//! worker out of its inter-track wait.
//!
//! ```text
//! Idle --start--> Playing --stop--> Idle
//!                  |    ^
//!      suspended   v    |  resumed
//!                 (Paused)
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::{AudioBackend, BackendError};
use crate::config::AudioConfig;
use crate::notify::Notifier;

mod decoder;
mod worker;

#[cfg(test)]
mod tests;

pub use decoder::{DecodeError, TrackDecoder, TrackOpener, VorbisOpener, decode_to_end};

/// Device buffers in flight per stream
pub const AUDIO_MAX_BUFFERS: usize = 4;

/// How long the worker sleeps when every buffer is still queued
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors that end music playback
#[derive(Debug, Error)]
pub enum MusicError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("failed to spawn music thread: {0}")]
    Spawn(std::io::Error),
}

/// Where tracks come from and how long to pause between them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicSettings {
    pub audio_dir: PathBuf,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl MusicSettings {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            audio_dir: config.audio_dir.clone(),
            min_delay: Duration::from_secs(config.min_music_delay_secs as u64),
            max_delay: Duration::from_secs(config.max_music_delay_secs as u64),
        }
    }
}

/// State shared between the foreground and the music worker
#[derive(Debug, Default)]
pub(crate) struct MusicShared {
    stopping: AtomicBool,
    suspended: AtomicBool,
    /// Set when playback failed; cleared by the next start
    disabled: AtomicBool,
    volume: AtomicU8,
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl MusicShared {
    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub(crate) fn volume(&self) -> u8 {
        self.volume.load(Ordering::SeqCst)
    }

    pub(crate) fn disable(&self) {
        self.volume.store(0, Ordering::SeqCst);
        self.disabled.store(true, Ordering::SeqCst);
    }

    /// Wake every waiter so it re-checks its condition
    fn signal(&self) {
        let _guard = self.wake_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.wake.notify_all();
    }

    /// Sleep up to `timeout`, returning early once stopping.
    ///
    /// Returns whether a stop was requested.
    pub(crate) fn wait_for_stop(&self, timeout: Duration) -> bool {
        self.wait_while(timeout, || !self.is_stopping());
        self.is_stopping()
    }

    /// Sleep up to `timeout` while `condition` holds
    pub(crate) fn wait_while(&self, timeout: Duration, condition: impl Fn() -> bool) {
        let guard = self.wake_lock.lock().unwrap_or_else(|e| e.into_inner());
        let _ = self
            .wake
            .wait_timeout_while(guard, timeout, |_| condition())
            .unwrap_or_else(|e| e.into_inner());
    }
}

/// Owns the music worker thread
pub struct MusicStreamer {
    shared: Arc<MusicShared>,
    opener: Arc<dyn TrackOpener>,
    notifier: Arc<dyn Notifier>,
    thread: Option<JoinHandle<()>>,
}

impl MusicStreamer {
    pub fn new(opener: Arc<dyn TrackOpener>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            shared: Arc::new(MusicShared::default()),
            opener,
            notifier,
            thread: None,
        }
    }

    /// Whether a worker exists and has not exited on its own
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Whether the last worker gave up after a playback failure
    pub fn is_disabled(&self) -> bool {
        self.shared.disabled.load(Ordering::SeqCst)
    }

    /// Start the worker at `volume` (0-100). A no-op while already running.
    ///
    /// The stream context is opened here, on the caller's thread, and moved
    /// into the worker.
    pub fn start(
        &mut self,
        backend: &mut dyn AudioBackend,
        settings: MusicSettings,
        volume: u8,
    ) -> Result<(), MusicError> {
        if self.is_running() {
            return Ok(());
        }
        self.reap();

        let stream = backend.open_stream(AUDIO_MAX_BUFFERS)?;
        self.shared.stopping.store(false, Ordering::SeqCst);
        self.shared.disabled.store(false, Ordering::SeqCst);
        self.shared.volume.store(volume, Ordering::SeqCst);

        let shared = self.shared.clone();
        let opener = self.opener.clone();
        let notifier = self.notifier.clone();
        let handle = thread::Builder::new()
            .name("music".into())
            .spawn(move || worker::run(stream, shared, opener, notifier, settings))
            .map_err(MusicError::Spawn)?;

        debug!("Music worker started");
        self.thread = Some(handle);
        Ok(())
    }

    /// Stop the worker and wait for it to exit
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Music worker panicked");
            }
            debug!("Music worker joined");
        }
    }

    /// Stop the worker without waiting for it, for process exit
    pub fn detach(&mut self) {
        self.request_stop();
        self.thread = None;
    }

    /// Change the volume of the playing track (0-100)
    pub fn set_volume(&self, volume: u8) {
        self.shared.volume.store(volume, Ordering::SeqCst);
    }

    /// Pause playback while the application is in the background
    pub fn set_suspended(&self, suspended: bool) {
        self.shared.suspended.store(suspended, Ordering::SeqCst);
        self.shared.signal();
    }

    fn request_stop(&self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        self.shared.signal();
    }

    /// Join a worker that already exited on its own
    fn reap(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Music worker panicked");
            }
        }
    }
}

impl Drop for MusicStreamer {
    fn drop(&mut self) {
        self.stop();
    }
}
