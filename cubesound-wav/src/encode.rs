//! WAV encoder implementation
//!
//! Writes the canonical 44-byte header form: RIFF header, a 16-byte PCM
//! `fmt ` chunk, then a single `data` chunk.

use crate::{BITS_PER_SAMPLE, DATA, FMT, FMT_CHUNK_SIZE, RIFF, WAVE, WAVE_FORMAT_PCM, WavFormat};

/// Encode interleaved 16-bit samples as a canonical WAV file
pub fn encode_wav(format: WavFormat, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = format.channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = format.sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(&RIFF);
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(&WAVE);

    out.extend_from_slice(&FMT);
    out.extend_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
    out.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&format.channels.to_le_bytes());
    out.extend_from_slice(&format.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(&DATA);
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let format = WavFormat {
            channels: 2,
            sample_rate: 48000,
        };
        let bytes = encode_wav(format, &[1, 2, 3, 4]);
        assert_eq!(bytes.len(), 44 + 8);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 36 + 8);
        assert_eq!(&bytes[12..16], b"fmt ");
        // byte rate = 48000 * 2 channels * 2 bytes
        assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), 192000);
        assert_eq!(u16::from_le_bytes([bytes[32], bytes[33]]), 4);
        assert_eq!(&bytes[36..40], b"data");
    }
}
