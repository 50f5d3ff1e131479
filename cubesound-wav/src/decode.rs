//! WAV decoder implementation
//!
//! Walks the RIFF chunk list of a forward-only reader. Archive entries are not
//! seekable, so unknown chunks are skipped by reading through them.

use std::io::{self, Read};

use crate::{
    BITS_PER_SAMPLE, CHUNK_HEADER_SIZE, DATA, DecodedWav, FMT, FMT_CHUNK_SIZE, RIFF,
    RIFF_HEADER_SIZE, WAVE, WAVE_FORMAT_PCM, WavError, WavFormat,
};

/// Decode a RIFF/WAVE stream into interleaved 16-bit PCM
///
/// # Errors
/// - [`WavError::Io`] if the reader fails or the stream ends inside a chunk
/// - [`WavError::Mp3Signature`] if the stream starts with an ID3 tag
/// - [`WavError::NotRiff`] / [`WavError::NotWave`] for a bad container signature
/// - [`WavError::UnsupportedEncoding`], [`WavError::UnsupportedBitDepth`],
///   [`WavError::UnsupportedChannels`] for anything but 16-bit PCM mono/stereo
/// - [`WavError::ZeroSampleRate`] for a 0 Hz clip
/// - [`WavError::OddDataSize`] if the `data` chunk ends mid-sample
pub fn decode_wav<R: Read>(mut reader: R) -> Result<DecodedWav, WavError> {
    let mut header = [0u8; RIFF_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    if is_id3_tag(&header) {
        return Err(WavError::Mp3Signature);
    }
    if header[0..4] != RIFF {
        return Err(WavError::NotRiff);
    }
    // header[4..8] is the RIFF size, which writers get wrong often enough to ignore
    if header[8..12] != WAVE {
        return Err(WavError::NotWave);
    }

    let mut format: Option<WavFormat> = None;

    loop {
        let mut chunk = [0u8; CHUNK_HEADER_SIZE];
        reader.read_exact(&mut chunk)?;
        let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);

        if chunk[0..4] == FMT {
            format = Some(read_format(&mut reader, size)?);
        } else if chunk[0..4] == DATA {
            let format = format.ok_or(WavError::MissingFormat)?;
            let samples = read_samples(&mut reader, size)?;
            return Ok(DecodedWav { format, samples });
        } else {
            skip(&mut reader, size as u64)?;
        }
    }
}

/// ID3v2 tag header ("ID3" followed by major version 2-4)
fn is_id3_tag(header: &[u8]) -> bool {
    header[0..3] == *b"ID3" && (2..=4).contains(&header[3])
}

/// Parse a `fmt ` chunk body of `size` bytes, skipping any extension bytes
fn read_format<R: Read>(reader: &mut R, size: u32) -> Result<WavFormat, WavError> {
    if size < FMT_CHUNK_SIZE {
        return Err(WavError::TruncatedFormat(size));
    }

    let mut fmt = [0u8; FMT_CHUNK_SIZE as usize];
    reader.read_exact(&mut fmt)?;

    let encoding = u16::from_le_bytes([fmt[0], fmt[1]]);
    if encoding != WAVE_FORMAT_PCM {
        return Err(WavError::UnsupportedEncoding(encoding));
    }

    let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
    let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
    // fmt[8..14]: byte rate and block align, derived from the fields above
    let bits_per_sample = u16::from_le_bytes([fmt[14], fmt[15]]);

    if bits_per_sample != BITS_PER_SAMPLE {
        return Err(WavError::UnsupportedBitDepth(bits_per_sample));
    }
    if !(1..=2).contains(&channels) {
        return Err(WavError::UnsupportedChannels(channels));
    }
    if sample_rate == 0 {
        return Err(WavError::ZeroSampleRate);
    }

    skip(reader, (size - FMT_CHUNK_SIZE) as u64)?;
    Ok(WavFormat {
        channels,
        sample_rate,
    })
}

/// Read exactly `size` bytes of little-endian PCM
///
/// The buffer grows as data arrives instead of trusting the declared size
/// up front, so a corrupt size field fails with EOF rather than a huge allocation.
fn read_samples<R: Read>(reader: &mut R, size: u32) -> Result<Vec<i16>, WavError> {
    if size % 2 != 0 {
        return Err(WavError::OddDataSize(size));
    }
    let mut bytes = Vec::new();
    reader.take(size as u64).read_to_end(&mut bytes)?;
    if bytes.len() != size as usize {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

fn skip<R: Read>(reader: &mut R, len: u64) -> io::Result<()> {
    if len == 0 {
        return Ok(());
    }
    let skipped = io::copy(&mut reader.take(len), &mut io::sink())?;
    if skipped != len {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}
