//! The audio subsystem as the game sees it
//!
//! [`AudioSystem`] owns the device backend, both boards, the music worker
//! and the soundpack pipeline, and applies the enable/disable rules:
//!
//! - A non-zero sounds volume opens the device and loads the sound archive
//!   (default, else fallback) into empty boards; zero empties the boards.
//! - A non-zero music volume starts the worker; zero stops and joins it.
//! - A device failure disables the affected feature by forcing its volume
//!   to zero, reported once.
//!
//! Everything runs on the caller's thread apart from the music worker.
//! Soundpack retrieval blocks; use [`AudioSystem::sound_packs`] to run it
//! elsewhere.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive;
use crate::backend::{AudioBackend, AudioData, CpalBackend};
use crate::board::{BoardKind, Boards};
use crate::config::{AudioConfig, MAX_VOLUME};
use crate::music::{MusicSettings, MusicStreamer, TrackOpener, VorbisOpener};
use crate::notify::{LogNotifier, NoticeLevel, Notifier};
use crate::router::{PlaybackRouter, SoundRequest, SoundSources};
use crate::soundpack::{
    HttpTransport, NoPrompt, PackError, PackPrompt, PromptChoice, RetrieveOutcome,
    SoundPackPipeline, Transport, parse_chat_trigger,
};

/// External collaborators the subsystem is wired to
pub struct AudioServices {
    pub backend: Box<dyn AudioBackend>,
    pub notifier: Arc<dyn Notifier>,
    pub opener: Arc<dyn TrackOpener>,
    pub transport: Box<dyn Transport>,
    pub prompt: Box<dyn PackPrompt>,
}

impl Default for AudioServices {
    /// Real device, Vorbis tracks, HTTP downloads, log output, no prompt
    fn default() -> Self {
        Self {
            backend: Box::new(CpalBackend::new()),
            notifier: Arc::new(LogNotifier),
            opener: Arc::new(VorbisOpener),
            transport: Box::new(HttpTransport::default()),
            prompt: Box::new(NoPrompt),
        }
    }
}

/// Block position of a positional sound; accepted and ignored
pub type SoundPosition = [u16; 3];

pub struct AudioSystem {
    config: AudioConfig,
    backend: Box<dyn AudioBackend>,
    notifier: Arc<dyn Notifier>,
    opener: Arc<dyn TrackOpener>,
    boards: Boards,
    archive_loaded: bool,
    router: PlaybackRouter,
    sounds_volume: u8,
    music_volume: u8,
    music: MusicStreamer,
    packs: Arc<SoundPackPipeline>,
}

impl AudioSystem {
    /// Wire the subsystem without touching the device
    pub fn new(config: AudioConfig, services: AudioServices) -> Self {
        let config = config.sanitized();
        let packs = SoundPackPipeline::new(
            &config.soundpack_cache_dir,
            services.transport,
            services.prompt,
            services.notifier.clone(),
        );
        packs.set_allow_server_sounds(config.allow_server_sounds);

        Self {
            music: MusicStreamer::new(services.opener.clone(), services.notifier.clone()),
            backend: services.backend,
            notifier: services.notifier,
            opener: services.opener,
            boards: Boards::default(),
            archive_loaded: false,
            router: PlaybackRouter::default(),
            sounds_volume: 0,
            music_volume: 0,
            packs: Arc::new(packs),
            config,
        }
    }

    /// Apply the configured volumes, opening the device if either is non-zero
    pub fn start(&mut self) {
        info!("Audio device: {}", self.backend.describe());
        self.set_sounds_volume(self.config.sounds_volume);
        self.set_music_volume(self.config.music_volume);
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn boards(&self) -> &Boards {
        &self.boards
    }

    pub fn sound_packs(&self) -> Arc<SoundPackPipeline> {
        self.packs.clone()
    }

    pub fn sounds_volume(&self) -> u8 {
        self.sounds_volume
    }

    /// Current music volume; zero once the worker gave up
    pub fn music_volume(&self) -> u8 {
        if self.music.is_disabled() {
            0
        } else {
            self.music_volume
        }
    }

    pub fn music_running(&self) -> bool {
        self.music.is_running()
    }

    // =========================================================================
    // Sounds
    // =========================================================================

    /// Set the sounds volume (0-100); zero disables sound effects
    pub fn set_sounds_volume(&mut self, volume: u8) {
        let volume = volume.min(MAX_VOLUME);
        self.config.sounds_volume = volume;

        if volume == 0 {
            self.sounds_volume = 0;
            self.boards.clear();
            self.archive_loaded = false;
            debug!("Sounds disabled");
            return;
        }

        if let Err(e) = self.backend.init() {
            warn!("Failed to init audio backend: {}", e);
            self.notifier.notify(
                NoticeLevel::Error,
                &format!("Failed to init audio backend ({}), disabling sounds", e),
            );
            self.sounds_volume = 0;
            return;
        }
        self.sounds_volume = volume;

        if !self.archive_loaded {
            self.archive_loaded = true;
            // Failures are already logged; an empty board just plays nothing
            let _ = archive::load_default(
                &self.config.default_sound_archive,
                &self.config.fallback_sound_archive,
                &mut self.boards,
                self.notifier.as_ref(),
            );
        }
    }

    /// Sound for a block being broken
    pub fn play_dig(&mut self, group: u16) {
        self.play_block(BoardKind::Dig, group);
    }

    /// Footstep sound for the block walked on
    pub fn play_step(&mut self, group: u16) {
        self.play_block(BoardKind::Step, group);
    }

    fn play_block(&mut self, kind: BoardKind, group: u16) {
        if self.sounds_volume == 0 {
            return;
        }
        let clip = self
            .router
            .block_sound(self.boards.get(kind), group, self.sounds_volume);
        if let Some(clip) = clip {
            self.play(&clip);
        }
    }

    /// Play a server-requested sound: built-in group ids below 100 on the
    /// dig/step channels, soundpack ids from 100 up on any channel.
    ///
    /// `volume` is 0-255 (255 = the full sounds volume), `rate` in percent.
    pub fn play_sound(&mut self, channel: u8, id: u16, volume: u8, rate: u8) {
        let request = SoundRequest {
            channel,
            id,
            volume,
            rate,
        };
        let custom = self.packs.table();
        let sources = SoundSources {
            boards: &self.boards,
            custom: &custom,
            opener: self.opener.as_ref(),
        };
        if let Some(clip) = self.router.route(sources, request, self.sounds_volume) {
            self.play(&clip);
        }
    }

    /// Positional variant of [`play_sound`](Self::play_sound); plays in 2D
    pub fn play_sound_3d(
        &mut self,
        channel: u8,
        id: u16,
        volume: u8,
        rate: u8,
        _position: SoundPosition,
    ) {
        self.play_sound(channel, id, volume, rate);
    }

    fn play(&mut self, clip: &AudioData) {
        if let Err(e) = self.backend.play_clip(clip) {
            warn!("Error playing sounds: {}", e);
            self.notifier.notify(NoticeLevel::Error, "Disabling sounds");
            self.set_sounds_volume(0);
        }
    }

    // =========================================================================
    // Music
    // =========================================================================

    /// Set the music volume (0-100); zero stops the music worker
    pub fn set_music_volume(&mut self, volume: u8) {
        let volume = volume.min(MAX_VOLUME);
        self.config.music_volume = volume;
        self.music_volume = volume;

        if volume == 0 {
            self.music.stop();
            return;
        }

        self.music.set_volume(volume);
        if self.music.is_running() {
            return;
        }

        if let Err(e) = self.backend.init() {
            warn!("Failed to init audio backend: {}", e);
            self.notifier.notify(
                NoticeLevel::Error,
                &format!("Failed to init audio backend ({}), disabling music", e),
            );
            self.music_volume = 0;
            return;
        }

        let settings = MusicSettings::from_config(&self.config);
        if let Err(e) = self.music.start(self.backend.as_mut(), settings, volume) {
            warn!("Failed to start music: {}", e);
            self.notifier.notify(NoticeLevel::Error, "Disabling music");
            self.music_volume = 0;
        }
    }

    /// Pause music while the window is in the background
    pub fn set_focus(&mut self, focused: bool) {
        self.music.set_suspended(!focused);
    }

    // =========================================================================
    // Soundpacks
    // =========================================================================

    /// Handle a chat message; returns whether it was a soundpack trigger
    pub fn handle_chat_message(&mut self, message: &str) -> bool {
        match parse_chat_trigger(message) {
            Some(url) => {
                self.retrieve_sound_pack(url);
                true
            }
            None => false,
        }
    }

    /// Retrieve the pack at `url` (blocks while downloading)
    pub fn retrieve_sound_pack(&mut self, url: &str) -> RetrieveOutcome {
        self.packs
            .set_allow_server_sounds(self.config.allow_server_sounds);
        self.packs.retrieve(url)
    }

    /// Apply the player's answer to a soundpack prompt
    pub fn resolve_prompt(
        &mut self,
        url: &str,
        choice: PromptChoice,
    ) -> Option<Result<usize, PackError>> {
        self.packs.resolve(url, choice)
    }

    pub fn set_allow_server_sounds(&mut self, allow: bool) {
        self.config.allow_server_sounds = allow;
        self.packs.set_allow_server_sounds(allow);
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Stop the music worker and drop all sounds
    pub fn shutdown(&mut self) {
        self.music.stop();
        self.boards.clear();
        self.archive_loaded = false;
        self.sounds_volume = 0;
    }

    /// Process-exit path: signal the music worker without joining it
    pub fn detach(&mut self) {
        self.music.detach();
    }
}
