//! cubesound-wav: RIFF/WAVE codec for short sound effects
//!
//! **This is a pure codec** - it turns a RIFF/WAVE byte stream into interleaved
//! 16-bit PCM plus the format fields needed for playback, and writes the canonical
//! form back out. Only the subset the game ships is accepted:
//!
//! | Field | Accepted values |
//! |-------|-----------------|
//! | Encoding | PCM (format tag 1) |
//! | Bits per sample | 16 |
//! | Channels | 1 or 2 |
//! | Sample rate | Non-zero |
//!
//! # Container layout
//!
//! ```text
//! RIFF header (12 bytes):
//!   0x00: "RIFF"
//!   0x04: file size - 8 (u32 LE, ignored)
//!   0x08: "WAVE"
//!
//! Chunks (repeat):
//!   0x00: fourCC (4 bytes)
//!   0x04: chunk size (u32 LE)
//!   0x08: chunk body
//! ```
//!
//! Decoding stops at the first `data` chunk; anything after it is never read.
//! Samples are stored little-endian in the file and converted with
//! `i16::from_le_bytes`, so the decoded PCM is correct on either host byte order.
//!
//! # Usage
//!
//! ```
//! use cubesound_wav::{decode_wav, encode_wav, WavFormat};
//!
//! let format = WavFormat { channels: 1, sample_rate: 22050 };
//! let bytes = encode_wav(format, &[0, 1000, -1000, 0]);
//! let decoded = decode_wav(bytes.as_slice()).unwrap();
//! assert_eq!(decoded.format, format);
//! assert_eq!(decoded.samples, vec![0, 1000, -1000, 0]);
//! ```

mod decode;
mod encode;

pub use decode::decode_wav;
pub use encode::encode_wav;

// =============================================================================
// Constants
// =============================================================================

/// Size of the RIFF/WAVE file header
pub const RIFF_HEADER_SIZE: usize = 12;

/// Size of a chunk header (fourCC + size)
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Size of the PCM `fmt ` chunk body
pub const FMT_CHUNK_SIZE: u32 = 16;

/// WAVE_FORMAT_PCM
pub const WAVE_FORMAT_PCM: u16 = 1;

/// The only supported sample depth
pub const BITS_PER_SAMPLE: u16 = 16;

pub(crate) const RIFF: [u8; 4] = *b"RIFF";
pub(crate) const WAVE: [u8; 4] = *b"WAVE";
pub(crate) const FMT: [u8; 4] = *b"fmt ";
pub(crate) const DATA: [u8; 4] = *b"data";

// =============================================================================
// Types
// =============================================================================

/// Playback format of a decoded clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    /// 1 (mono) or 2 (stereo)
    pub channels: u16,
    /// Source sample rate in Hz
    pub sample_rate: u32,
}

/// A fully decoded WAV clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedWav {
    pub format: WavFormat,
    /// Interleaved 16-bit samples in native byte order
    pub samples: Vec<i16>,
}

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur while decoding a WAV stream
#[derive(Debug)]
pub enum WavError {
    /// The underlying reader failed or ended early
    Io(std::io::Error),
    /// Missing `RIFF` signature
    NotRiff,
    /// RIFF container that is not `WAVE`
    NotWave,
    /// The stream starts with an ID3 tag: an MP3 renamed to .wav
    Mp3Signature,
    /// Format tag other than PCM
    UnsupportedEncoding(u16),
    /// Sample depth other than 16 bits
    UnsupportedBitDepth(u16),
    /// Neither mono nor stereo
    UnsupportedChannels(u16),
    /// A sample rate of 0 Hz
    ZeroSampleRate,
    /// `data` chunk with an odd byte count
    OddDataSize(u32),
    /// `fmt ` chunk shorter than the PCM header
    TruncatedFormat(u32),
    /// `data` chunk seen before any `fmt ` chunk
    MissingFormat,
}

impl WavError {
    /// Whether the error comes from the stream rather than the file contents
    pub fn is_stream_error(&self) -> bool {
        matches!(self, WavError::Io(_))
    }
}

impl core::fmt::Display for WavError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WavError::Io(e) => write!(f, "stream error: {}", e),
            WavError::NotRiff => write!(f, "not a WAV file (missing RIFF header)"),
            WavError::NotWave => write!(f, "not a WAV file (RIFF type is not WAVE)"),
            WavError::Mp3Signature => write!(f, "file is an MP3 (ID3 tag), not a WAV"),
            WavError::UnsupportedEncoding(tag) => {
                write!(f, "unsupported WAV encoding {} (only PCM)", tag)
            }
            WavError::UnsupportedBitDepth(bits) => {
                write!(f, "unsupported bits per sample {} (only 16)", bits)
            }
            WavError::UnsupportedChannels(channels) => {
                write!(f, "unsupported channel count {} (mono or stereo only)", channels)
            }
            WavError::ZeroSampleRate => write!(f, "sample rate is 0 Hz"),
            WavError::OddDataSize(size) => {
                write!(f, "data chunk of {} bytes is not whole 16-bit samples", size)
            }
            WavError::TruncatedFormat(size) => write!(f, "fmt chunk too small ({} bytes)", size),
            WavError::MissingFormat => write!(f, "data chunk before fmt chunk"),
        }
    }
}

impl std::error::Error for WavError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WavError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WavError {
    fn from(e: std::io::Error) -> Self {
        WavError::Io(e)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sine(channels: u16, frames: usize) -> Vec<i16> {
        (0..frames * channels as usize)
            .map(|i| (f32::sin(i as f32 * 0.05) * 12000.0) as i16)
            .collect()
    }

    #[test]
    fn test_roundtrip_is_byte_identical() {
        for channels in [1u16, 2] {
            let format = WavFormat {
                channels,
                sample_rate: 44100,
            };
            let bytes = encode_wav(format, &sine(channels, 500));
            let decoded = decode_wav(bytes.as_slice()).unwrap();
            assert_eq!(encode_wav(decoded.format, &decoded.samples), bytes);
        }
    }

    #[test]
    fn test_decodes_hound_output() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let samples = sine(2, 300);

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in &samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let decoded = decode_wav(cursor.get_ref().as_slice()).unwrap();
        assert_eq!(decoded.format.channels, 2);
        assert_eq!(decoded.format.sample_rate, 22050);
        assert_eq!(decoded.samples, samples);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            WavError::UnsupportedBitDepth(8).to_string(),
            "unsupported bits per sample 8 (only 16)"
        );
        assert!(WavError::Io(std::io::ErrorKind::UnexpectedEof.into()).is_stream_error());
        assert!(!WavError::NotRiff.is_stream_error());
    }
}
