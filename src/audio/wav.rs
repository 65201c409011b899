//! WAV encoding and decoding via `hound`.
//!
//! Used for the request body sent to the speech provider, for the hotword
//! sample recordings on disk, and for trimming those samples before they
//! are submitted for training.

use std::io::Cursor;
use std::path::Path;

use thiserror::Error;

use super::{AudioClip, AudioFormat, SilenceDetector};

#[derive(Debug, Error)]
pub enum WavError {
    #[error("wav codec error: {0}")]
    Codec(#[from] hound::Error),

    #[error("unsupported wav layout: {bits} bits per sample")]
    Unsupported { bits: u16 },
}

fn spec_for(format: AudioFormat) -> hound::WavSpec {
    hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Encode 16-bit PCM into an in-memory WAV file.
pub fn encode_wav(samples: &[i16], format: AudioFormat) -> Result<Vec<u8>, WavError> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec_for(format))?;
        for &s in samples {
            writer.write_sample(s)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Encode a finished command clip.
pub fn clip_to_wav(clip: &AudioClip) -> Result<Vec<u8>, WavError> {
    encode_wav(clip.samples(), clip.format())
}

/// Write 16-bit PCM to `path`, replacing any existing file.
pub fn write_wav(path: &Path, samples: &[i16], format: AudioFormat) -> Result<(), WavError> {
    let mut writer = hound::WavWriter::create(path, spec_for(format))?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Read a 16-bit PCM WAV file. Other bit depths are rejected.
pub fn read_wav(path: &Path) -> Result<(Vec<i16>, AudioFormat), WavError> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(WavError::Unsupported {
            bits: spec.bits_per_sample,
        });
    }
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()?;
    let format = AudioFormat::new(spec.sample_rate, spec.channels, spec.bits_per_sample);
    Ok((samples, format))
}

/// Copy `src` to `dst` with leading and trailing silence removed.
///
/// Returns the number of samples kept.
pub fn trim_wav_file(
    src: &Path,
    dst: &Path,
    threshold: f32,
    min_silence: std::time::Duration,
) -> Result<usize, WavError> {
    let (samples, format) = read_wav(src)?;
    let detector = SilenceDetector::for_format(threshold, min_silence, format);
    let trimmed = detector.trim_silence(&samples);
    write_wav(dst, trimmed, format)?;
    Ok(trimmed.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
