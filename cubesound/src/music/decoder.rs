//! Compressed track decoding
//!
//! Music is Ogg/Vorbis, decoded one packet at a time with `lewton`.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use lewton::inside_ogg::OggStreamReader;
use thiserror::Error;

/// Errors from opening or decoding a compressed track
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open track: {0}")]
    Io(#[from] io::Error),
    #[error("vorbis decode error: {0}")]
    Vorbis(#[from] lewton::VorbisError),
    #[error("unsupported track format: {0}")]
    Format(String),
}

/// Frame-by-frame decoder for one open track
pub trait TrackDecoder: Send {
    fn channels(&self) -> u16;

    fn sample_rate(&self) -> u32;

    /// Upper bound on the samples a single [`decode_frame`](Self::decode_frame) appends
    fn max_frame_samples(&self) -> usize;

    /// Decode the next frame, appending interleaved samples to `out`.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn decode_frame(&mut self, out: &mut Vec<i16>) -> Result<bool, DecodeError>;
}

/// Opens tracks by path
pub trait TrackOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn TrackDecoder>, DecodeError>;
}

/// Decode a whole track into memory
pub fn decode_to_end(decoder: &mut dyn TrackDecoder) -> Result<Vec<i16>, DecodeError> {
    let mut samples = Vec::new();
    while decoder.decode_frame(&mut samples)? {}
    Ok(samples)
}

/// Ogg/Vorbis tracks via `lewton`
#[derive(Debug, Default, Clone, Copy)]
pub struct VorbisOpener;

impl TrackOpener for VorbisOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn TrackDecoder>, DecodeError> {
        let file = File::open(path)?;
        let reader = OggStreamReader::new(BufReader::new(file))?;

        let channels = reader.ident_hdr.audio_channels as u16;
        if !(1..=2).contains(&channels) {
            return Err(DecodeError::Format(format!("{} channels", channels)));
        }
        Ok(Box::new(VorbisDecoder { reader, channels }))
    }
}

struct VorbisDecoder {
    reader: OggStreamReader<BufReader<File>>,
    channels: u16,
}

impl TrackDecoder for VorbisDecoder {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.reader.ident_hdr.audio_sample_rate
    }

    fn max_frame_samples(&self) -> usize {
        // The long block size bounds the output of one packet per channel
        (1usize << self.reader.ident_hdr.blocksize_1) * self.channels as usize
    }

    fn decode_frame(&mut self, out: &mut Vec<i16>) -> Result<bool, DecodeError> {
        match self.reader.read_dec_packet_itl()? {
            Some(samples) => {
                out.extend_from_slice(&samples);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = VorbisOpener.open(&dir.path().join("missing.ogg"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }

    #[test]
    fn test_open_garbage_is_vorbis_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.ogg");
        std::fs::write(&path, b"definitely not an ogg stream").unwrap();
        assert!(VorbisOpener.open(&path).is_err());
    }
}
