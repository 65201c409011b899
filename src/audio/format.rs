//! PCM format descriptors and the immutable audio containers passed between
//! the capture path, the hotword detector and the command recorder.
//!
//! Everything downstream of the capture callback works on signed 16-bit
//! samples; the callback converts whatever the device delivers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AudioFormat
// ---------------------------------------------------------------------------

/// Sample rate, channel count and bit depth of a capture session.
///
/// Fixed for the lifetime of one session; the detector dictates it and the
/// audio source honours it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Samples per second per channel (Hz).
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Bits per sample. Only 16 is produced by the capture path.
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    /// 16 kHz mono 16-bit, the format hotword engines are trained on.
    fn default() -> Self {
        Self::new(16_000, 1, 16)
    }
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Interleaved samples produced per second of audio.
    pub fn samples_per_sec(&self) -> usize {
        self.sample_rate as usize * self.channels as usize
    }

    /// Bytes per sample (`bits_per_sample / 8`).
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Playback duration of `samples` interleaved samples.
    pub fn duration_of(&self, samples: usize) -> Duration {
        let per_sec = self.samples_per_sec();
        if per_sec == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(samples as f64 / per_sec as f64)
    }

    /// Number of interleaved samples covering `duration` (rounded down).
    pub fn samples_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.samples_per_sec() as f64) as usize
    }
}

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// A chunk of captured PCM audio. Immutable once built.
///
/// [`AudioSource::read`](crate::audio::AudioSource::read) returns whatever was
/// buffered (possibly nothing); the pipeline re-slices that into frames of
/// the detector's fixed length.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<i16>,
    format: AudioFormat,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, format: AudioFormat) -> Self {
        Self { samples, format }
    }

    /// A frame carrying no audio.
    pub fn empty(format: AudioFormat) -> Self {
        Self::new(Vec::new(), format)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.samples.len())
    }
}

// ---------------------------------------------------------------------------
// AudioClip
// ---------------------------------------------------------------------------

/// A finished command recording, ready to be handed to a recognizer.
///
/// Same format as the capture session, 16-bit PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Vec<i16>,
    format: AudioFormat,
}

impl AudioClip {
    pub fn new(samples: Vec<i16>, format: AudioFormat) -> Self {
        Self { samples, format }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// `true` when nothing was captured; recognition is skipped for such clips.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.samples.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_is_16k_mono_16bit() {
        let f = AudioFormat::default();
        assert_eq!(f.sample_rate, 16_000);
        assert_eq!(f.channels, 1);
        assert_eq!(f.bits_per_sample, 16);
        assert_eq!(f.bytes_per_sample(), 2);
    }

    #[test]
    fn duration_and_sample_count_agree() {
        let f = AudioFormat::new(16_000, 1, 16);
        assert_eq!(f.samples_for(Duration::from_millis(100)), 1_600);
        assert_eq!(f.duration_of(8_000), Duration::from_millis(500));
    }

    #[test]
    fn stereo_counts_interleaved_samples() {
        let f = AudioFormat::new(16_000, 2, 16);
        assert_eq!(f.samples_for(Duration::from_secs(1)), 32_000);
    }

    #[test]
    fn zero_rate_has_zero_duration() {
        let f = AudioFormat::new(0, 1, 16);
        assert_eq!(f.duration_of(1_000), Duration::ZERO);
    }

    #[test]
    fn frame_accessors() {
        let frame = AudioFrame::new(vec![1, 2, 3], AudioFormat::default());
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
        assert!(AudioFrame::empty(AudioFormat::default()).is_empty());
    }

    #[test]
    fn clip_duration() {
        let clip = AudioClip::new(vec![0; 16_000], AudioFormat::default());
        assert_eq!(clip.duration(), Duration::from_secs(1));
        assert!(!clip.is_empty());
    }
}
