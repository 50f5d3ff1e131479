//! cubesound - Block game audio subsystem
//!
//! Sound effects, background music and downloadable soundpacks for a block
//! game client.
//!
//! # Architecture
//!
//! - [`Soundboard`] - Dig and step boards of fixed-capacity clip groups
//! - [`archive`] - Fills the boards from a zip of `dig_*`/`step_*` WAV files
//! - [`MusicStreamer`] - Background worker streaming Ogg/Vorbis tracks
//! - [`SoundPackPipeline`] - Downloads, caches and registers custom sound ids
//! - [`PlaybackRouter`] - Turns play requests into clips for the device
//! - [`AudioSystem`] - Owns all of the above and the device backend
//!
//! The device, track decoder, HTTP transport, chat output and soundpack
//! prompt are traits ([`AudioBackend`], [`TrackOpener`], [`Transport`],
//! [`Notifier`], [`PackPrompt`]) so the game and tests can swap them.

pub mod archive;
pub mod backend;
pub mod board;
pub mod config;
pub mod music;
pub mod notify;
pub mod router;
pub mod soundpack;
pub mod system;
#[cfg(test)]
mod test_support;

pub use backend::{AudioBackend, AudioChunk, AudioData, BackendError, CpalBackend, NullBackend};
pub use board::{BoardError, BoardKind, Boards, Sound, Soundboard, find_group};
pub use config::AudioConfig;
pub use music::{MusicError, MusicSettings, MusicStreamer, TrackOpener, VorbisOpener};
pub use notify::{LogNotifier, NoticeLevel, Notifier};
pub use router::{Channel, PlaybackRouter, SoundRequest};
pub use soundpack::{
    HttpTransport, PackError, PackPrompt, PromptChoice, RetrieveOutcome, SoundPackPipeline,
    Transport,
};
pub use system::{AudioServices, AudioSystem};

// Re-export the codec for callers decoding clips themselves
pub use cubesound_wav::{DecodedWav, WavError, WavFormat, decode_wav};
