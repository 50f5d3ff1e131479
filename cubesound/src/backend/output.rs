//! Audio output using cpal
//!
//! One cpal output stream mixes everything:
//! - Sound effect voices arrive through a lock-free ring buffer and play once
//! - Music streams are shared queues of chunks, played back to back
//!
//! Playback rate changes use nearest-sample stepping; there is no resampling
//! filter. The callback only ever `try_lock`s the stream queues, so a busy
//! worker costs one silent callback rather than blocking the device.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use ringbuf::{
    HeapRb,
    traits::{Consumer, Producer, Split},
};
use tracing::{debug, error, info, warn};

use super::{AudioBackend, AudioChunk, AudioData, BackendError, StreamContext};

/// Pending voices between the game thread and the callback
const VOICE_QUEUE_SIZE: usize = 64;

/// Voices mixed at once; extra clips are dropped
const MAX_ACTIVE_VOICES: usize = 32;

/// Initial mix buffer size in samples (grown on demand)
const MIX_BUFFER_SIZE: usize = 4096;

type StreamRegistry = Arc<Mutex<Vec<Arc<Mutex<StreamQueue>>>>>;

/// cpal-backed device
#[derive(Default)]
pub struct CpalBackend {
    output: Option<Output>,
}

struct Output {
    /// Kept alive for the lifetime of the backend
    _stream: cpal::Stream,
    voices: ringbuf::HeapProd<Voice>,
    streams: StreamRegistry,
    sample_rate: u32,
    device_name: String,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn output(&mut self) -> Result<&mut Output, BackendError> {
        self.output.as_mut().ok_or(BackendError::NotInitialized)
    }
}

impl AudioBackend for CpalBackend {
    fn init(&mut self) -> Result<(), BackendError> {
        if self.output.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(BackendError::NoDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| BackendError::Config(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.config();

        let (producer, consumer) = HeapRb::<Voice>::new(VOICE_QUEUE_SIZE).split();
        let streams: StreamRegistry = Arc::new(Mutex::new(Vec::new()));
        let mixer = Mixer::new(consumer, streams.clone(), config.channels as usize, sample_rate);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer)?,
            other => return Err(BackendError::UnsupportedFormat(format!("{:?}", other))),
        };
        stream
            .play()
            .map_err(|e| BackendError::Stream(e.to_string()))?;

        info!(
            "Audio output on {} ({} Hz, {} channels)",
            device_name, sample_rate, config.channels
        );

        self.output = Some(Output {
            _stream: stream,
            voices: producer,
            streams,
            sample_rate,
            device_name,
        });
        Ok(())
    }

    fn play_clip(&mut self, clip: &AudioData) -> Result<(), BackendError> {
        let output = self.output()?;
        let Some(voice) = Voice::new(clip, output.sample_rate) else {
            return Ok(());
        };
        if output.voices.try_push(voice).is_err() {
            debug!("Voice queue full, dropping clip");
        }
        Ok(())
    }

    fn open_stream(&mut self, buffers: usize) -> Result<Box<dyn StreamContext>, BackendError> {
        let output = self.output()?;
        let queue = Arc::new(Mutex::new(StreamQueue::new(buffers)));
        output
            .streams
            .lock()
            .map_err(|_| BackendError::Stream("stream registry poisoned".to_string()))?
            .push(queue.clone());
        Ok(Box::new(CpalStreamContext {
            queue,
            registry: output.streams.clone(),
            out_rate: output.sample_rate,
        }))
    }

    fn describe(&self) -> String {
        match &self.output {
            Some(output) => format!("cpal: {} @ {} Hz", output.device_name, output.sample_rate),
            None => "cpal (closed)".to_string(),
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
) -> Result<cpal::Stream, BackendError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut mix_buffer: Vec<f32> = vec![0.0; MIX_BUFFER_SIZE];
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if mix_buffer.len() < data.len() {
                    mix_buffer.resize(data.len(), 0.0);
                }
                let mixed = &mut mix_buffer[..data.len()];
                mixer.mix(mixed);
                for (out, &sample) in data.iter_mut().zip(mixed.iter()) {
                    *out = <T as cpal::Sample>::from_sample(sample);
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| BackendError::Stream(e.to_string()))
}

// =============================================================================
// Mixing
// =============================================================================

#[inline]
fn to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Add one stereo frame into an output frame of any width
#[inline]
fn add_frame(frame: &mut [f32], left: f32, right: f32) {
    match frame {
        [mono] => *mono += (left + right) * 0.5,
        [l, r, ..] => {
            *l += left;
            *r += right;
        }
        [] => {}
    }
}

/// Read frame `index` of interleaved mono/stereo PCM as (left, right)
#[inline]
fn read_frame(data: &[i16], channels: usize, index: usize) -> (f32, f32) {
    let base = index * channels;
    let left = to_f32(data[base]);
    let right = if channels > 1 { to_f32(data[base + 1]) } else { left };
    (left, right)
}

/// Source frames advanced per output frame
fn step_for(sample_rate: u32, rate_percent: u32, out_rate: u32) -> f64 {
    sample_rate as f64 * rate_percent as f64 / 100.0 / out_rate.max(1) as f64
}

/// A sound effect in flight
struct Voice {
    data: Arc<Vec<i16>>,
    channels: usize,
    position: f64,
    step: f64,
    gain: f32,
}

impl Voice {
    fn new(clip: &AudioData, out_rate: u32) -> Option<Self> {
        let channels = clip.channels as usize;
        if channels == 0
            || clip.sample_rate == 0
            || clip.data.is_empty()
            || clip.volume == 0
            || clip.rate == 0
        {
            return None;
        }
        Some(Self {
            data: clip.data.clone(),
            channels,
            position: 0.0,
            step: step_for(clip.sample_rate, clip.rate, out_rate),
            gain: clip.volume.min(100) as f32 / 100.0,
        })
    }

    /// Mix into `out`; returns false once the clip has ended
    fn mix_into(&mut self, out: &mut [f32], out_channels: usize) -> bool {
        let frames = self.data.len() / self.channels;
        for frame in out.chunks_exact_mut(out_channels) {
            let index = self.position as usize;
            if index >= frames {
                return false;
            }
            let (left, right) = read_frame(&self.data, self.channels, index);
            add_frame(frame, left * self.gain, right * self.gain);
            self.position += self.step;
        }
        (self.position as usize) < frames
    }
}

/// Chunks queued on one music stream
struct StreamQueue {
    queued: VecDeque<AudioChunk>,
    finished: VecDeque<AudioChunk>,
    /// Frame position inside the front chunk
    cursor: f64,
    channels: usize,
    sample_rate: u32,
    playback_rate: u32,
    gain: f32,
    playing: bool,
}

impl StreamQueue {
    fn new(buffers: usize) -> Self {
        Self {
            queued: VecDeque::with_capacity(buffers),
            finished: VecDeque::with_capacity(buffers),
            cursor: 0.0,
            channels: 2,
            sample_rate: 44_100,
            playback_rate: 100,
            gain: 1.0,
            playing: false,
        }
    }

    fn mix_into(&mut self, out: &mut [f32], out_channels: usize, out_rate: u32) {
        if !self.playing {
            return;
        }
        let step = step_for(self.sample_rate, self.playback_rate, out_rate);

        for frame in out.chunks_exact_mut(out_channels) {
            self.retire_played();
            let Some(front) = self.queued.front() else {
                return;
            };
            let (left, right) = read_frame(&front.data, self.channels, self.cursor as usize);
            add_frame(frame, left * self.gain, right * self.gain);
            self.cursor += step;
        }
        self.retire_played();
    }

    /// Move every chunk the cursor has passed to the finished queue
    fn retire_played(&mut self) {
        while let Some(front) = self.queued.front() {
            let frames = front.data.len() / self.channels;
            if (self.cursor as usize) < frames {
                break;
            }
            self.cursor = (self.cursor - frames as f64).max(0.0);
            if let Some(done) = self.queued.pop_front() {
                self.finished.push_back(done);
            }
        }
    }

    fn clear(&mut self) {
        self.playing = false;
        self.queued.clear();
        self.finished.clear();
        self.cursor = 0.0;
    }
}

/// Runs on the cpal callback thread
struct Mixer {
    incoming: ringbuf::HeapCons<Voice>,
    active: Vec<Voice>,
    streams: StreamRegistry,
    out_channels: usize,
    out_rate: u32,
}

impl Mixer {
    fn new(
        incoming: ringbuf::HeapCons<Voice>,
        streams: StreamRegistry,
        out_channels: usize,
        out_rate: u32,
    ) -> Self {
        Self {
            incoming,
            active: Vec::with_capacity(MAX_ACTIVE_VOICES),
            streams,
            out_channels: out_channels.max(1),
            out_rate,
        }
    }

    fn mix(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        while let Some(voice) = self.incoming.try_pop() {
            if self.active.len() < MAX_ACTIVE_VOICES {
                self.active.push(voice);
            }
        }
        let out_channels = self.out_channels;
        self.active.retain_mut(|voice| voice.mix_into(out, out_channels));

        if let Ok(streams) = self.streams.try_lock() {
            for queue in streams.iter() {
                if let Ok(mut queue) = queue.try_lock() {
                    queue.mix_into(out, out_channels, self.out_rate);
                }
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

// =============================================================================
// Stream context
// =============================================================================

struct CpalStreamContext {
    queue: Arc<Mutex<StreamQueue>>,
    registry: StreamRegistry,
    out_rate: u32,
}

impl CpalStreamContext {
    fn with_queue<R>(&self, f: impl FnOnce(&mut StreamQueue) -> R) -> Result<R, BackendError> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| BackendError::Stream("stream queue poisoned".to_string()))?;
        Ok(f(&mut queue))
    }
}

impl StreamContext for CpalStreamContext {
    fn set_format(
        &mut self,
        channels: u16,
        sample_rate: u32,
        playback_rate: u32,
    ) -> Result<(), BackendError> {
        if !(1..=2).contains(&channels) {
            return Err(BackendError::UnsupportedFormat(format!(
                "{} channels",
                channels
            )));
        }
        if sample_rate == 0 || playback_rate == 0 {
            return Err(BackendError::UnsupportedFormat(format!(
                "{} Hz at {}% rate",
                sample_rate, playback_rate
            )));
        }
        debug!(
            "Stream format: {} channels, {} Hz (output {} Hz)",
            channels, sample_rate, self.out_rate
        );
        self.with_queue(|queue| {
            queue.channels = channels as usize;
            queue.sample_rate = sample_rate;
            queue.playback_rate = playback_rate;
        })
    }

    fn enqueue(&mut self, chunk: AudioChunk) -> Result<(), BackendError> {
        self.with_queue(|queue| queue.queued.push_back(chunk))
    }

    fn play(&mut self) -> Result<(), BackendError> {
        self.with_queue(|queue| queue.playing = true)
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        self.with_queue(|queue| queue.playing = false)
    }

    fn update(&mut self) -> Result<usize, BackendError> {
        self.with_queue(|queue| queue.queued.len())
    }

    fn reclaim(&mut self) -> Option<AudioChunk> {
        self.with_queue(|queue| queue.finished.pop_front())
            .ok()
            .flatten()
    }

    fn set_volume(&mut self, volume: u8) {
        if let Err(e) = self.with_queue(|queue| queue.gain = volume.min(100) as f32 / 100.0) {
            warn!("Failed to set stream volume: {}", e);
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.with_queue(StreamQueue::clear) {
            warn!("Failed to clear stream on close: {}", e);
        }
        if let Ok(mut streams) = self.registry.lock() {
            streams.retain(|queue| !Arc::ptr_eq(queue, &self.queue));
        }
    }
}

impl Drop for CpalStreamContext {
    fn drop(&mut self) {
        self.close();
    }
}
