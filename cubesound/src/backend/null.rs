//! Backend without a device
//!
//! Accepts everything and retires streamed chunks immediately. Used on
//! machines without audio output and by tests.

use std::collections::VecDeque;

use tracing::trace;

use super::{AudioBackend, AudioChunk, AudioData, BackendError, StreamContext};

#[derive(Debug, Default)]
pub struct NullBackend {
    initialized: bool,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for NullBackend {
    fn init(&mut self) -> Result<(), BackendError> {
        self.initialized = true;
        Ok(())
    }

    fn play_clip(&mut self, clip: &AudioData) -> Result<(), BackendError> {
        if !self.initialized {
            return Err(BackendError::NotInitialized);
        }
        trace!(
            "null backend: clip of {} samples at {}% volume",
            clip.data.len(),
            clip.volume
        );
        Ok(())
    }

    fn open_stream(&mut self, _buffers: usize) -> Result<Box<dyn StreamContext>, BackendError> {
        if !self.initialized {
            return Err(BackendError::NotInitialized);
        }
        Ok(Box::new(NullStream::default()))
    }

    fn describe(&self) -> String {
        "null (no output)".to_string()
    }
}

/// Stream context that finishes every chunk as soon as it is queued
#[derive(Debug, Default)]
pub struct NullStream {
    finished: VecDeque<AudioChunk>,
}

impl StreamContext for NullStream {
    fn set_format(&mut self, _: u16, _: u32, _: u32) -> Result<(), BackendError> {
        Ok(())
    }

    fn enqueue(&mut self, chunk: AudioChunk) -> Result<(), BackendError> {
        self.finished.push_back(chunk);
        Ok(())
    }

    fn play(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn update(&mut self) -> Result<usize, BackendError> {
        Ok(0)
    }

    fn reclaim(&mut self) -> Option<AudioChunk> {
        self.finished.pop_front()
    }

    fn set_volume(&mut self, _volume: u8) {}

    fn close(&mut self) {
        self.finished.clear();
    }
}
