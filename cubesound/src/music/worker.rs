//! Music worker thread body

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tracing::{debug, error, info, trace};
use walkdir::WalkDir;

use crate::backend::{AudioChunk, StreamContext};
use crate::notify::{NoticeLevel, Notifier};

use super::{
    AUDIO_MAX_BUFFERS, MusicError, MusicSettings, MusicShared, POLL_INTERVAL, TrackDecoder,
    TrackOpener,
};

/// Recursively collect `.ogg` files under `dir`, sorted for a stable order
pub(crate) fn find_tracks(dir: &Path) -> Vec<PathBuf> {
    let mut tracks: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("ogg"))
        })
        .collect();
    tracks.sort();
    tracks
}

pub(super) fn run(
    stream: Box<dyn StreamContext>,
    shared: Arc<MusicShared>,
    opener: Arc<dyn TrackOpener>,
    notifier: Arc<dyn Notifier>,
    settings: MusicSettings,
) {
    let mut worker = Worker {
        stream,
        shared,
        opener,
        rng: Pcg32::seed_from_u64(rand::random()),
        settings,
    };

    if let Err(e) = worker.run_loop() {
        error!("Music playback failed: {}", e);
        worker.shared.disable();
        notifier.notify(NoticeLevel::Error, "Disabling music");
    }
    worker.stream.close();
    debug!("Music worker exiting");
}

struct Worker {
    stream: Box<dyn StreamContext>,
    shared: Arc<MusicShared>,
    opener: Arc<dyn TrackOpener>,
    rng: Pcg32,
    settings: MusicSettings,
}

impl Worker {
    fn run_loop(&mut self) -> Result<(), MusicError> {
        let tracks = find_tracks(&self.settings.audio_dir);
        if tracks.is_empty() {
            info!("No music found in {}", self.settings.audio_dir.display());
            return Ok(());
        }
        debug!("Found {} music tracks", tracks.len());

        while !self.shared.is_stopping() {
            let path = &tracks[self.rng.random_range(0..tracks.len())];
            info!("Playing music file: {}", path.display());
            self.play_track(path)?;

            if self.shared.is_stopping() {
                break;
            }
            let delay = self.next_delay();
            debug!("Next track in {:?}", delay);
            if self.shared.wait_for_stop(delay) {
                break;
            }
        }
        Ok(())
    }

    fn next_delay(&mut self) -> Duration {
        let (min, max) = (self.settings.min_delay, self.settings.max_delay);
        if max <= min {
            return min;
        }
        let millis = self
            .rng
            .random_range(min.as_millis() as u64..=max.as_millis() as u64);
        Duration::from_millis(millis)
    }

    fn play_track(&mut self, path: &Path) -> Result<(), MusicError> {
        let mut decoder = self.opener.open(path)?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();

        // One second of audio, plus room for the frame that crosses the mark
        let target = channels as usize * sample_rate as usize;
        let capacity = target + decoder.max_frame_samples();

        self.stream.set_format(channels, sample_rate, 100)?;
        let mut volume = self.shared.volume();
        self.stream.set_volume(volume);

        let mut spare: Vec<AudioChunk> = (0..AUDIO_MAX_BUFFERS)
            .map(|_| AudioChunk::with_capacity(capacity))
            .collect();
        let mut finished = false;

        while !finished && !self.shared.is_stopping() {
            let Some(mut chunk) = spare.pop() else { break };
            finished = fill_chunk(decoder.as_mut(), &mut chunk, target)?;
            self.submit(chunk, &mut spare)?;
        }
        if self.shared.is_stopping() {
            return Ok(());
        }
        self.stream.play()?;

        while !finished && !self.shared.is_stopping() {
            if self.shared.is_suspended() {
                self.wait_suspended()?;
                continue;
            }

            let current = self.shared.volume();
            if current != volume {
                volume = current;
                self.stream.set_volume(volume);
            }

            let in_use = self.stream.update()?;
            if in_use >= AUDIO_MAX_BUFFERS {
                self.shared.wait_for_stop(POLL_INTERVAL);
                continue;
            }

            let Some(mut chunk) = self.stream.reclaim().or_else(|| spare.pop()) else {
                self.shared.wait_for_stop(POLL_INTERVAL);
                continue;
            };
            finished = fill_chunk(decoder.as_mut(), &mut chunk, target)?;
            self.submit(chunk, &mut spare)?;
        }

        // Stopping abandons the queued buffers; `run` closes the stream
        if self.shared.is_stopping() {
            return Ok(());
        }

        trace!("End of track, draining");
        while self.stream.update()? > 0 {
            if self.shared.wait_for_stop(POLL_INTERVAL) {
                return Ok(());
            }
        }
        self.stream.pause()?;
        while self.stream.reclaim().is_some() {}
        Ok(())
    }

    /// Queue a filled chunk; empty chunks go back to the spare pool
    fn submit(&mut self, chunk: AudioChunk, spare: &mut Vec<AudioChunk>) -> Result<(), MusicError> {
        if chunk.data.is_empty() {
            spare.push(chunk);
            return Ok(());
        }
        self.stream.enqueue(chunk)?;
        Ok(())
    }

    fn wait_suspended(&mut self) -> Result<(), MusicError> {
        debug!("Music suspended");
        self.stream.pause()?;
        while self.shared.is_suspended() && !self.shared.is_stopping() {
            let shared = &self.shared;
            shared.wait_while(POLL_INTERVAL * 10, || {
                shared.is_suspended() && !shared.is_stopping()
            });
        }
        if !self.shared.is_stopping() {
            debug!("Music resumed");
            self.stream.play()?;
        }
        Ok(())
    }
}

/// Decode frames into `chunk` until it holds `target` samples.
///
/// Returns whether the end of the track was reached.
fn fill_chunk(
    decoder: &mut dyn TrackDecoder,
    chunk: &mut AudioChunk,
    target: usize,
) -> Result<bool, MusicError> {
    chunk.data.clear();
    while chunk.data.len() < target {
        if !decoder.decode_frame(&mut chunk.data)? {
            return Ok(true);
        }
    }
    Ok(false)
}
