//! Audio device backends
//!
//! Two playback paths go through a backend:
//! - Sound effects: fire-and-forget clips via [`AudioBackend::play_clip`]
//! - Music: a [`StreamContext`] fed with a rotating pool of PCM buffers
//!
//! A stream context owns every buffer between `enqueue` and `reclaim`; buffers
//! come back in the order the device finished playing them.

use std::sync::Arc;

use thiserror::Error;

mod null;
mod output;

pub use null::NullBackend;
pub use output::CpalBackend;

/// Errors reported by a device backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("audio backend not initialised")]
    NotInitialized,
    #[error("failed to configure audio device: {0}")]
    Config(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// One sound effect to play, with its playback parameters
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved 16-bit PCM, shared with the board that owns the clip
    pub data: Arc<Vec<i16>>,
    pub channels: u16,
    pub sample_rate: u32,
    /// 0-100
    pub volume: u8,
    /// Playback rate in percent (100 = source pitch)
    pub rate: u32,
}

/// One buffer of streamed PCM
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioChunk {
    /// Interleaved 16-bit PCM; capacity is kept across reuse
    pub data: Vec<i16>,
}

impl AudioChunk {
    pub fn with_capacity(samples: usize) -> Self {
        Self {
            data: Vec::with_capacity(samples),
        }
    }
}

/// Platform audio device
pub trait AudioBackend {
    /// Open the device. Calling again after success is a no-op.
    fn init(&mut self) -> Result<(), BackendError>;

    /// Play a clip once, mixed over whatever is already playing
    fn play_clip(&mut self, clip: &AudioData) -> Result<(), BackendError>;

    /// Open a streaming context that holds at most `buffers` queued chunks
    fn open_stream(&mut self, buffers: usize) -> Result<Box<dyn StreamContext>, BackendError>;

    /// Human-readable description of the device, for logs
    fn describe(&self) -> String;
}

/// A streaming playback context, owned by the music worker
pub trait StreamContext: Send {
    /// Set the PCM layout of subsequent chunks; `playback_rate` is in percent
    fn set_format(
        &mut self,
        channels: u16,
        sample_rate: u32,
        playback_rate: u32,
    ) -> Result<(), BackendError>;

    /// Queue a chunk after the ones already queued
    fn enqueue(&mut self, chunk: AudioChunk) -> Result<(), BackendError>;

    fn play(&mut self) -> Result<(), BackendError>;

    fn pause(&mut self) -> Result<(), BackendError>;

    /// Poll the device; returns the number of chunks still queued or playing
    fn update(&mut self) -> Result<usize, BackendError>;

    /// Take back the oldest chunk the device has finished with
    fn reclaim(&mut self) -> Option<AudioChunk>;

    /// 0-100
    fn set_volume(&mut self, volume: u8);

    /// Stop playback and drop everything still queued
    fn close(&mut self);
}
