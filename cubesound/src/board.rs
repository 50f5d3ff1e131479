//! Sound boards: named groups of interchangeable clips
//!
//! Two boards exist, one for breaking blocks ("dig") and one for footsteps
//! ("step"). Each board is indexed by group id. The first [`GROUP_NAMES`]
//! ids have canonical names; the remaining ids up to [`BOARD_GROUPS`] are only
//! reachable through an in-archive mapping file.

use std::sync::Arc;

use cubesound_wav::DecodedWav;
use rand::Rng;
use thiserror::Error;

/// Maximum clips per group
pub const GROUP_CAPACITY: usize = 10;

/// Number of group slots per board; ids at or above this are custom sounds
pub const BOARD_GROUPS: usize = 100;

/// Canonical group names, indexed by group id
pub const GROUP_NAMES: [&str; 12] = [
    "none",
    "wood",
    "gravel",
    "grass",
    "stone",
    "metal",
    "glass",
    "cloth",
    "sand",
    "snow",
    "pling",
    "challenge_complete",
];

pub const SOUND_NONE: u16 = 0;
pub const SOUND_STONE: u16 = 4;
pub const SOUND_METAL: u16 = 5;

/// Errors raised while filling a board
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("sound group '{0}' is full ({max} sounds)", max = GROUP_CAPACITY)]
    GroupFull(String),
    #[error("unknown sound group '{0}'")]
    UnknownGroup(String),
    #[error("sound group id {0} out of range (0-{max})", max = BOARD_GROUPS - 1)]
    OutOfRange(u32),
}

/// One decoded clip
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sound {
    /// 1 (mono) or 2 (stereo)
    pub channels: u16,
    /// Source sample rate in Hz, played back as-is
    pub sample_rate: u32,
    /// Interleaved 16-bit PCM
    pub data: Arc<Vec<i16>>,
}

impl From<DecodedWav> for Sound {
    fn from(wav: DecodedWav) -> Self {
        Self {
            channels: wav.format.channels,
            sample_rate: wav.format.sample_rate,
            data: Arc::new(wav.samples),
        }
    }
}

/// Which board a clip belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardKind {
    Dig,
    Step,
}

impl BoardKind {
    /// File name prefix selecting this board in a sound archive
    pub fn prefix(self) -> &'static str {
        match self {
            BoardKind::Dig => "dig_",
            BoardKind::Step => "step_",
        }
    }

    /// Match a lowercase file name against the board prefixes
    pub fn from_prefixed(name: &str) -> Option<(BoardKind, &str)> {
        [BoardKind::Dig, BoardKind::Step]
            .into_iter()
            .find_map(|kind| name.strip_prefix(kind.prefix()).map(|rest| (kind, rest)))
    }
}

/// Display name of a group id (`#<id>` for unnamed slots)
pub fn group_label(group: u16) -> String {
    match GROUP_NAMES.get(group as usize) {
        Some(name) => (*name).to_string(),
        None => format!("#{}", group),
    }
}

/// Case-insensitive lookup of a canonical group name
pub fn find_group(name: &str) -> Option<u16> {
    GROUP_NAMES
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(name))
        .map(|id| id as u16)
}

/// A board of [`BOARD_GROUPS`] fixed-capacity groups
#[derive(Debug, Clone)]
pub struct Soundboard {
    kind: BoardKind,
    groups: Vec<Vec<Sound>>,
}

impl Soundboard {
    pub fn new(kind: BoardKind) -> Self {
        Self {
            kind,
            groups: vec![Vec::new(); BOARD_GROUPS],
        }
    }

    pub fn kind(&self) -> BoardKind {
        self.kind
    }

    /// Append a clip to a group, preserving insertion order.
    ///
    /// A full group keeps its existing clips and rejects the new one.
    pub fn add(&mut self, group: u16, sound: Sound) -> Result<(), BoardError> {
        let slot = self
            .groups
            .get_mut(group as usize)
            .ok_or(BoardError::OutOfRange(group as u32))?;
        if slot.len() >= GROUP_CAPACITY {
            return Err(BoardError::GroupFull(group_label(group)));
        }
        slot.push(sound);
        Ok(())
    }

    pub fn is_full(&self, group: u16) -> bool {
        self.len(group) >= GROUP_CAPACITY
    }

    /// Number of clips in a group (0 for out-of-range ids)
    pub fn len(&self, group: u16) -> usize {
        self.groups.get(group as usize).map_or(0, Vec::len)
    }

    /// Total clips across all groups
    pub fn total(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn sounds(&self, group: u16) -> &[Sound] {
        self.groups.get(group as usize).map_or(&[], Vec::as_slice)
    }

    /// Uniformly pick one clip of a group.
    ///
    /// Metal reuses the stone clips. Returns `None` for [`SOUND_NONE`],
    /// out-of-range ids and empty groups.
    pub fn pick_random<R: Rng + ?Sized>(&self, group: u16, rng: &mut R) -> Option<&Sound> {
        if group == SOUND_NONE {
            return None;
        }
        let group = if group == SOUND_METAL { SOUND_STONE } else { group };
        let sounds = self.groups.get(group as usize)?;
        if sounds.is_empty() {
            return None;
        }
        sounds.get(rng.random_range(0..sounds.len()))
    }

    /// Drop every clip
    pub fn clear(&mut self) {
        for group in &mut self.groups {
            group.clear();
        }
    }
}

/// The dig and step boards together
#[derive(Debug, Clone)]
pub struct Boards {
    pub dig: Soundboard,
    pub step: Soundboard,
}

impl Default for Boards {
    fn default() -> Self {
        Self {
            dig: Soundboard::new(BoardKind::Dig),
            step: Soundboard::new(BoardKind::Step),
        }
    }
}

impl Boards {
    pub fn get(&self, kind: BoardKind) -> &Soundboard {
        match kind {
            BoardKind::Dig => &self.dig,
            BoardKind::Step => &self.step,
        }
    }

    pub fn get_mut(&mut self, kind: BoardKind) -> &mut Soundboard {
        match kind {
            BoardKind::Dig => &mut self.dig,
            BoardKind::Step => &mut self.step,
        }
    }

    pub fn clear(&mut self) {
        self.dig.clear();
        self.step.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.dig.is_empty() && self.step.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn clip(tag: i16) -> Sound {
        Sound {
            channels: 1,
            sample_rate: 22050,
            data: Arc::new(vec![tag; 4]),
        }
    }

    #[test]
    fn test_find_group_case_insensitive() {
        assert_eq!(find_group("grass"), Some(3));
        assert_eq!(find_group("GRASS"), Some(3));
        assert_eq!(find_group("Challenge_Complete"), Some(11));
        assert_eq!(find_group("lava"), None);
        assert_eq!(find_group(""), None);
    }

    #[test]
    fn test_capacity_is_never_exceeded() {
        let mut board = Soundboard::new(BoardKind::Dig);
        for i in 0..25 {
            let result = board.add(3, clip(i));
            if i < GROUP_CAPACITY as i16 {
                assert!(result.is_ok());
            } else {
                assert_eq!(result, Err(BoardError::GroupFull("grass".into())));
            }
        }
        assert_eq!(board.len(3), GROUP_CAPACITY);
        assert!(board.is_full(3));
        // The first ten clips are kept, in insertion order
        let tags: Vec<i16> = board.sounds(3).iter().map(|s| s.data[0]).collect();
        assert_eq!(tags, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_add_out_of_range() {
        let mut board = Soundboard::new(BoardKind::Step);
        assert_eq!(board.add(100, clip(0)), Err(BoardError::OutOfRange(100)));
        assert!(board.add(99, clip(0)).is_ok());
    }

    #[test]
    fn test_pick_random_empty_and_none() {
        let board = Soundboard::new(BoardKind::Dig);
        for seed in 0..32 {
            let mut rng = Pcg32::seed_from_u64(seed);
            assert!(board.pick_random(3, &mut rng).is_none());
            assert!(board.pick_random(SOUND_NONE, &mut rng).is_none());
            assert!(board.pick_random(500, &mut rng).is_none());
        }
    }

    #[test]
    fn test_pick_random_stays_in_group() {
        let mut board = Soundboard::new(BoardKind::Dig);
        for i in 0..3 {
            board.add(1, clip(i)).unwrap();
        }
        let mut rng = Pcg32::seed_from_u64(7);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let sound = board.pick_random(1, &mut rng).unwrap();
            seen[sound.data[0] as usize] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn test_metal_aliases_stone() {
        let mut board = Soundboard::new(BoardKind::Step);
        board.add(SOUND_STONE, clip(42)).unwrap();
        let mut rng = Pcg32::seed_from_u64(1);
        assert_eq!(board.pick_random(SOUND_METAL, &mut rng).unwrap().data[0], 42);
    }

    #[test]
    fn test_prefix_matching() {
        assert_eq!(
            BoardKind::from_prefixed("dig_grass1"),
            Some((BoardKind::Dig, "grass1"))
        );
        assert_eq!(
            BoardKind::from_prefixed("step_wood"),
            Some((BoardKind::Step, "wood"))
        );
        assert_eq!(BoardKind::from_prefixed("break_wood"), None);
    }

    #[test]
    fn test_clear() {
        let mut boards = Boards::default();
        boards.dig.add(2, clip(0)).unwrap();
        boards.step.add(3, clip(0)).unwrap();
        assert!(!boards.is_empty());
        boards.clear();
        assert!(boards.is_empty());
    }
}
