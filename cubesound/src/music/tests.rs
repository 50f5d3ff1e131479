//! Tests for the music worker

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use tempfile::TempDir;

use super::*;
use crate::test_support::CollectingNotifier;
use crate::backend::{AudioChunk, StreamContext};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct Recording {
    opened: usize,
    format: Option<(u16, u32, u32)>,
    enqueued: Vec<Vec<i16>>,
    volumes: Vec<u8>,
    events: Vec<&'static str>,
    queued: VecDeque<AudioChunk>,
    finished: VecDeque<AudioChunk>,
    /// Keep every chunk "in use" forever
    hold: bool,
}

struct RecordingStream(Arc<Mutex<Recording>>);

impl StreamContext for RecordingStream {
    fn set_format(&mut self, channels: u16, rate: u32, playback: u32) -> Result<(), BackendError> {
        self.0.lock().unwrap().format = Some((channels, rate, playback));
        Ok(())
    }

    fn enqueue(&mut self, chunk: AudioChunk) -> Result<(), BackendError> {
        let mut rec = self.0.lock().unwrap();
        rec.enqueued.push(chunk.data.clone());
        rec.queued.push_back(chunk);
        Ok(())
    }

    fn play(&mut self) -> Result<(), BackendError> {
        self.0.lock().unwrap().events.push("play");
        Ok(())
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        self.0.lock().unwrap().events.push("pause");
        Ok(())
    }

    fn update(&mut self) -> Result<usize, BackendError> {
        let mut rec = self.0.lock().unwrap();
        if !rec.hold {
            while let Some(chunk) = rec.queued.pop_front() {
                rec.finished.push_back(chunk);
            }
        }
        Ok(rec.queued.len())
    }

    fn reclaim(&mut self) -> Option<AudioChunk> {
        self.0.lock().unwrap().finished.pop_front()
    }

    fn set_volume(&mut self, volume: u8) {
        self.0.lock().unwrap().volumes.push(volume);
    }

    fn close(&mut self) {
        let mut rec = self.0.lock().unwrap();
        rec.events.push("close");
        rec.queued.clear();
        rec.finished.clear();
    }
}

#[derive(Default)]
struct RecordingBackend(Arc<Mutex<Recording>>);

impl AudioBackend for RecordingBackend {
    fn init(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn play_clip(&mut self, _: &crate::backend::AudioData) -> Result<(), BackendError> {
        Ok(())
    }

    fn open_stream(&mut self, _: usize) -> Result<Box<dyn StreamContext>, BackendError> {
        self.0.lock().unwrap().opened += 1;
        Ok(Box::new(RecordingStream(self.0.clone())))
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

/// Mono 1 kHz track of `frames` frames of 250 samples, counting up from 0
struct CountingOpener {
    frames: usize,
    fail: bool,
}

struct CountingDecoder {
    next: i16,
    remaining: usize,
}

impl TrackOpener for CountingOpener {
    fn open(&self, _: &std::path::Path) -> Result<Box<dyn TrackDecoder>, DecodeError> {
        if self.fail {
            return Err(DecodeError::Format("broken".into()));
        }
        Ok(Box::new(CountingDecoder {
            next: 0,
            remaining: self.frames,
        }))
    }
}

impl TrackDecoder for CountingDecoder {
    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        1000
    }

    fn max_frame_samples(&self) -> usize {
        250
    }

    fn decode_frame(&mut self, out: &mut Vec<i16>) -> Result<bool, DecodeError> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.remaining -= 1;
        for _ in 0..250 {
            out.push(self.next);
            self.next = self.next.wrapping_add(1);
        }
        Ok(true)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn music_dir(tracks: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for track in tracks {
        let path = dir.path().join(track);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"fake").unwrap();
    }
    dir
}

fn settings(dir: &TempDir, delay_secs: u64) -> MusicSettings {
    MusicSettings {
        audio_dir: dir.path().to_path_buf(),
        min_delay: Duration::from_secs(delay_secs),
        max_delay: Duration::from_secs(delay_secs),
    }
}

fn streamer(opener: CountingOpener) -> (MusicStreamer, Arc<CollectingNotifier>) {
    let notifier = Arc::new(CollectingNotifier::new());
    let streamer = MusicStreamer::new(Arc::new(opener), notifier.clone());
    (streamer, notifier)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_find_tracks_recursive() {
    let dir = music_dir(&["a.ogg", "sub/deeper/b.OGG", "readme.txt", "c.wav"]);
    let tracks = worker::find_tracks(dir.path());
    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| {
        t.extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("ogg"))
    }));
}

#[test]
fn test_plays_track_in_decode_order() {
    let dir = music_dir(&["track.ogg"]);
    let backend_rec = Arc::new(Mutex::new(Recording::default()));
    let mut backend = RecordingBackend(backend_rec.clone());
    // 10 frames of 250 samples = 2.5 seconds at 1 kHz mono
    let (mut music, notifier) = streamer(CountingOpener {
        frames: 10,
        fail: false,
    });

    music.start(&mut backend, settings(&dir, 600), 80).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        backend_rec.lock().unwrap().events.contains(&"pause")
    }));

    let rec = backend_rec.lock().unwrap();
    assert_eq!(rec.format, Some((1, 1000, 100)));
    assert_eq!(rec.volumes.first(), Some(&80));
    let sizes: Vec<usize> = rec.enqueued.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);
    let all: Vec<i16> = rec.enqueued.concat();
    assert_eq!(all, (0..2500).map(|i| i as i16).collect::<Vec<_>>());
    drop(rec);

    music.stop();
    assert!(notifier.take().is_empty());
}

#[test]
fn test_stop_interrupts_inter_track_delay() {
    let dir = music_dir(&["track.ogg"]);
    let backend_rec = Arc::new(Mutex::new(Recording::default()));
    let mut backend = RecordingBackend(backend_rec.clone());
    let (mut music, _) = streamer(CountingOpener {
        frames: 1,
        fail: false,
    });

    // Ten minute pause between tracks
    music.start(&mut backend, settings(&dir, 600), 100).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        backend_rec.lock().unwrap().events.contains(&"pause")
    }));
    thread::sleep(Duration::from_millis(20));
    assert!(music.is_running());

    let start = Instant::now();
    music.stop();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(!music.is_running());
}

#[test]
fn test_stop_abandons_queued_buffers() {
    let dir = music_dir(&["track.ogg"]);
    let backend_rec = Arc::new(Mutex::new(Recording {
        hold: true,
        ..Default::default()
    }));
    let mut backend = RecordingBackend(backend_rec.clone());
    let (mut music, _) = streamer(CountingOpener {
        frames: 1000,
        fail: false,
    });

    music.start(&mut backend, settings(&dir, 0), 100).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        backend_rec.lock().unwrap().events.contains(&"play")
    }));

    // The device never finishes a buffer: the worker must still see the volume change
    music.set_volume(30);
    assert!(wait_until(Duration::from_secs(5), || {
        backend_rec.lock().unwrap().volumes.contains(&30)
    }));

    music.stop();
    let rec = backend_rec.lock().unwrap();
    assert_eq!(rec.enqueued.len(), AUDIO_MAX_BUFFERS);
    assert_eq!(rec.events.iter().filter(|&&e| e == "close").count(), 1);
    assert!(!rec.events.contains(&"pause"));
}

#[test]
fn test_suspend_pauses_and_resumes() {
    let dir = music_dir(&["track.ogg"]);
    let backend_rec = Arc::new(Mutex::new(Recording {
        hold: true,
        ..Default::default()
    }));
    let mut backend = RecordingBackend(backend_rec.clone());
    let (mut music, _) = streamer(CountingOpener {
        frames: 1000,
        fail: false,
    });

    music.start(&mut backend, settings(&dir, 0), 100).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        backend_rec.lock().unwrap().events.contains(&"play")
    }));

    music.set_suspended(true);
    assert!(wait_until(Duration::from_secs(5), || {
        backend_rec.lock().unwrap().events.contains(&"pause")
    }));
    music.set_suspended(false);
    assert!(wait_until(Duration::from_secs(5), || {
        backend_rec
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| **e == "play")
            .count()
            == 2
    }));
    music.stop();
}

#[test]
fn test_decode_failure_disables_music_once() {
    let dir = music_dir(&["a.ogg", "b.ogg"]);
    let mut backend = RecordingBackend::default();
    let (mut music, notifier) = streamer(CountingOpener {
        frames: 0,
        fail: true,
    });

    music.start(&mut backend, settings(&dir, 0), 100).unwrap();
    assert!(wait_until(Duration::from_secs(5), || !music.is_running()));
    assert!(music.is_disabled());
    assert_eq!(music.shared.volume(), 0);

    let messages = notifier.take();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1, "Disabling music");
}

#[test]
fn test_no_tracks_idles_quietly() {
    let dir = music_dir(&[]);
    let mut backend = RecordingBackend::default();
    let (mut music, notifier) = streamer(CountingOpener {
        frames: 1,
        fail: false,
    });

    music.start(&mut backend, settings(&dir, 0), 100).unwrap();
    assert!(wait_until(Duration::from_secs(5), || !music.is_running()));
    assert!(!music.is_disabled());
    assert!(notifier.take().is_empty());
}

#[test]
fn test_start_while_running_is_noop() {
    let dir = music_dir(&["track.ogg"]);
    let backend_rec = Arc::new(Mutex::new(Recording::default()));
    let mut backend = RecordingBackend(backend_rec.clone());
    let (mut music, _) = streamer(CountingOpener {
        frames: 1,
        fail: false,
    });

    music.start(&mut backend, settings(&dir, 600), 100).unwrap();
    music.start(&mut backend, settings(&dir, 600), 100).unwrap();
    assert_eq!(backend_rec.lock().unwrap().opened, 1);
    music.stop();
}
