//! Play request routing
//!
//! Block sounds come from the dig/step boards with a fixed pitch and volume
//! policy. Server play requests carry a channel, an id, a 0-255 volume and a
//! rate: ids below [`CUSTOM_SOUND_MIN_ID`] pick from a board, the rest come
//! from the current soundpack table.
//!
//! Every silent outcome (zero volume, muted sounds, unknown channel, empty
//! group, unregistered custom id) is `None`, never an error.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use tracing::trace;

use crate::backend::AudioData;
use crate::board::{BoardKind, Boards, SOUND_METAL, SOUND_NONE, Sound, Soundboard};
use crate::music::TrackOpener;
use crate::soundpack::{CUSTOM_SOUND_MIN_ID, CustomSoundTable};

/// Request volume meaning "the player's full sounds volume"
pub const FULL_REQUEST_VOLUME: u8 = 255;

/// Channel index of a server play request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    Dig = 0,
    Step = 1,
    Music = 2,
}

impl Channel {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Channel::Dig),
            1 => Some(Channel::Step),
            2 => Some(Channel::Music),
            _ => None,
        }
    }

    /// Board backing built-in ids on this channel
    pub fn board(self) -> Option<BoardKind> {
        match self {
            Channel::Dig => Some(BoardKind::Dig),
            Channel::Step => Some(BoardKind::Step),
            Channel::Music => None,
        }
    }
}

/// A server request to play a sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundRequest {
    /// Raw channel index, see [`Channel`]
    pub channel: u8,
    pub id: u16,
    /// 0-255, scaled against the sounds volume
    pub volume: u8,
    /// Playback rate in percent
    pub rate: u8,
}

/// Volume and rate used for a block sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSoundPolicy {
    pub volume: u8,
    pub rate: u32,
}

/// Digging plays lower pitched, footsteps at half volume; metal is higher
/// pitched than the stone clips it borrows.
pub fn block_sound_policy(kind: BoardKind, group: u16, sounds_volume: u8) -> BlockSoundPolicy {
    let metal = group == SOUND_METAL;
    match kind {
        BoardKind::Dig => BlockSoundPolicy {
            volume: sounds_volume,
            rate: if metal { 120 } else { 80 },
        },
        BoardKind::Step => BlockSoundPolicy {
            volume: sounds_volume / 2,
            rate: if metal { 140 } else { 100 },
        },
    }
}

/// Scale a 0-255 request volume against the 0-100 sounds volume
pub fn scale_volume(sounds_volume: u8, volume: u8) -> u8 {
    if volume == FULL_REQUEST_VOLUME {
        return sounds_volume;
    }
    (sounds_volume as u32 * volume as u32 / FULL_REQUEST_VOLUME as u32) as u8
}

/// Everything a request can be served from
#[derive(Clone, Copy)]
pub struct SoundSources<'a> {
    pub boards: &'a Boards,
    pub custom: &'a CustomSoundTable,
    pub opener: &'a dyn TrackOpener,
}

/// Turns play requests into clips, owning the pick RNG
#[derive(Debug, Clone)]
pub struct PlaybackRouter {
    rng: Pcg32,
}

impl Default for PlaybackRouter {
    fn default() -> Self {
        Self::seeded(rand::random())
    }
}

impl PlaybackRouter {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Clip for a block being broken or stepped on
    pub fn block_sound(
        &mut self,
        board: &Soundboard,
        group: u16,
        sounds_volume: u8,
    ) -> Option<AudioData> {
        let policy = block_sound_policy(board.kind(), group, sounds_volume);
        self.pick(board, group, policy.volume, policy.rate)
    }

    /// Clip for a server play request
    pub fn route(
        &mut self,
        sources: SoundSources<'_>,
        request: SoundRequest,
        sounds_volume: u8,
    ) -> Option<AudioData> {
        if request.volume == 0 || sounds_volume == 0 {
            return None;
        }
        let channel = Channel::from_index(request.channel)?;
        let volume = scale_volume(sounds_volume, request.volume);
        let rate = request.rate as u32;

        if request.id < CUSTOM_SOUND_MIN_ID {
            let board = sources.boards.get(channel.board()?);
            return self.pick(board, request.id, volume, rate);
        }

        let Some(entry) = sources.custom.get(request.id) else {
            trace!("Custom sound {} is not registered", request.id);
            return None;
        };
        let sound = entry.sound(sources.opener)?;
        trace!("Playing custom sound {} (id {})", entry.relative, entry.id);
        clip(sound, volume, rate)
    }

    fn pick(&mut self, board: &Soundboard, group: u16, volume: u8, rate: u32) -> Option<AudioData> {
        if group == SOUND_NONE {
            return None;
        }
        let sound = board.pick_random(group, &mut self.rng)?;
        clip(sound, volume, rate)
    }
}

fn clip(sound: &Sound, volume: u8, rate: u32) -> Option<AudioData> {
    if volume == 0 {
        return None;
    }
    Some(AudioData {
        data: sound.data.clone(),
        channels: sound.channels,
        sample_rate: sound.sample_rate,
        volume,
        rate,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::board::SOUND_STONE;
    use crate::music::VorbisOpener;
    use crate::soundpack::ManifestEntry;

    fn sound(tag: i16) -> Sound {
        Sound {
            channels: 1,
            sample_rate: 22050,
            data: Arc::new(vec![tag, 0]),
        }
    }

    fn boards() -> Boards {
        let mut boards = Boards::default();
        boards.dig.add(3, sound(3)).unwrap();
        boards.dig.add(SOUND_STONE, sound(4)).unwrap();
        boards.step.add(3, sound(30)).unwrap();
        boards.step.add(12, sound(12)).unwrap();
        boards
    }

    fn request(channel: u8, id: u16, volume: u8) -> SoundRequest {
        SoundRequest {
            channel,
            id,
            volume,
            rate: 100,
        }
    }

    // =========================================================================
    // Policy
    // =========================================================================

    #[test]
    fn test_block_sound_policy() {
        assert_eq!(
            block_sound_policy(BoardKind::Dig, 3, 80),
            BlockSoundPolicy { volume: 80, rate: 80 }
        );
        assert_eq!(
            block_sound_policy(BoardKind::Dig, SOUND_METAL, 80),
            BlockSoundPolicy { volume: 80, rate: 120 }
        );
        assert_eq!(
            block_sound_policy(BoardKind::Step, 3, 80),
            BlockSoundPolicy { volume: 40, rate: 100 }
        );
        assert_eq!(
            block_sound_policy(BoardKind::Step, SOUND_METAL, 80),
            BlockSoundPolicy { volume: 40, rate: 140 }
        );
    }

    #[test]
    fn test_scale_volume() {
        assert_eq!(scale_volume(70, 255), 70);
        assert_eq!(scale_volume(100, 128), 50);
        assert_eq!(scale_volume(100, 1), 0);
        assert_eq!(scale_volume(0, 255), 0);
    }

    #[test]
    fn test_channel_index() {
        assert_eq!(Channel::from_index(1), Some(Channel::Step));
        assert_eq!(Channel::from_index(3), None);
        assert_eq!(Channel::Music.board(), None);
    }

    // =========================================================================
    // Routing
    // =========================================================================

    #[test]
    fn test_block_sound_uses_board_kind() {
        let boards = boards();
        let mut router = PlaybackRouter::seeded(1);

        let dig = router.block_sound(&boards.dig, SOUND_METAL, 100).unwrap();
        assert_eq!((dig.data[0], dig.volume, dig.rate), (4, 100, 120));

        let step = router.block_sound(&boards.step, 3, 100).unwrap();
        assert_eq!((step.data[0], step.volume, step.rate), (30, 50, 100));

        assert!(router.block_sound(&boards.dig, SOUND_NONE, 100).is_none());
        assert!(router.block_sound(&boards.dig, 3, 0).is_none());
    }

    #[test]
    fn test_route_builtin_ids() {
        let boards = boards();
        let custom = CustomSoundTable::empty();
        let sources = SoundSources {
            boards: &boards,
            custom: &custom,
            opener: &VorbisOpener,
        };
        let mut router = PlaybackRouter::seeded(2);

        // Mapped ids beyond the named groups are reachable too
        let clip = router.route(sources, request(1, 12, 255), 60).unwrap();
        assert_eq!((clip.data[0], clip.volume, clip.rate), (12, 60, 100));

        assert!(router.route(sources, request(0, 12, 255), 60).is_none());
        // Music has no board
        assert!(router.route(sources, request(2, 3, 255), 60).is_none());
    }

    #[test]
    fn test_route_silent_cases() {
        let boards = boards();
        let custom = CustomSoundTable::empty();
        let sources = SoundSources {
            boards: &boards,
            custom: &custom,
            opener: &VorbisOpener,
        };
        let mut router = PlaybackRouter::seeded(3);

        assert!(router.route(sources, request(0, 3, 0), 100).is_none());
        assert!(router.route(sources, request(0, 3, 255), 0).is_none());
        assert!(router.route(sources, request(9, 3, 255), 100).is_none());
        assert!(router.route(sources, request(0, 150, 255), 100).is_none());
    }

    #[test]
    fn test_route_custom_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sounds")).unwrap();
        std::fs::write(
            dir.path().join("sounds/boom.wav"),
            crate::test_support::wav_bytes(9),
        )
        .unwrap();
        let custom = CustomSoundTable::from_manifest(
            dir.path(),
            &[ManifestEntry {
                path: "sounds/boom.wav".to_string(),
                id: 150,
            }],
        );
        let boards = Boards::default();
        let sources = SoundSources {
            boards: &boards,
            custom: &custom,
            opener: &VorbisOpener,
        };
        let mut router = PlaybackRouter::seeded(4);

        // Any known channel may carry a custom id
        for channel in 0..3 {
            let clip = router.route(sources, request(channel, 150, 128), 100).unwrap();
            assert_eq!((clip.data[0], clip.volume), (9, 50));
        }
        assert!(custom.get(150).unwrap().loaded());
        assert!(router.route(sources, request(3, 150, 255), 100).is_none());
    }
}
