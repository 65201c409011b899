//! Amplitude-based silence detection on 16-bit PCM.
//!
//! A sample is *loud* when its absolute value exceeds a fraction of full
//! scale (10 % by default). [`SilenceDetector`] answers two questions:
//!
//! * how much silence trails a chunk (drives the recorder's end-of-command
//!   decision), and
//! * where speech starts and ends in a finished clip ([`trim_silence`]).
//!
//! Trimming works on windows of `min_silence` length: a window counts as
//! voice when any sample in it is loud, and the result spans the first to
//! the last voice window.
//!
//! [`trim_silence`]: SilenceDetector::trim_silence

use std::time::Duration;

use super::AudioFormat;

/// Default loudness threshold as a fraction of full scale.
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.10;

/// Default minimum silence duration.
pub const DEFAULT_MIN_SILENCE: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// SilenceDetector
// ---------------------------------------------------------------------------

/// Peak-amplitude silence classifier.
///
/// ```rust
/// use voice_command::audio::SilenceDetector;
///
/// let det = SilenceDetector::new(0.1, 160);
/// let mut audio = vec![0_i16; 160];
/// audio.extend(vec![12_000_i16; 160]);
/// audio.extend(vec![0_i16; 320]);
/// assert_eq!(det.trim_silence(&audio).len(), 160);
/// ```
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    /// Absolute sample value above which audio counts as speech.
    level: i16,
    /// Window length in samples.
    window: usize,
}

impl SilenceDetector {
    /// `threshold` is a fraction of full scale, clamped to `[0.0, 1.0]`.
    ///
    /// # Panics
    ///
    /// Panics if `window == 0`.
    pub fn new(threshold: f32, window: usize) -> Self {
        assert!(window > 0, "silence window must be > 0");
        let level = (threshold.clamp(0.0, 1.0) * i16::MAX as f32) as i16;
        Self { level, window }
    }

    /// Window sized to `min_silence` at `format`, never shorter than one sample.
    pub fn for_format(threshold: f32, min_silence: Duration, format: AudioFormat) -> Self {
        Self::new(threshold, format.samples_for(min_silence).max(1))
    }

    /// Absolute amplitude above which a sample is speech.
    pub fn level(&self) -> i16 {
        self.level
    }

    /// Minimum silence run in samples.
    pub fn window(&self) -> usize {
        self.window
    }

    fn is_loud(&self, sample: i16) -> bool {
        sample.unsigned_abs() > self.level.unsigned_abs()
    }

    /// `true` when no sample in `chunk` exceeds the threshold.
    pub fn is_silent(&self, chunk: &[i16]) -> bool {
        !chunk.iter().any(|&s| self.is_loud(s))
    }

    /// Number of quiet samples at the end of `chunk`.
    ///
    /// Equals `chunk.len()` when the whole chunk is quiet.
    pub fn trailing_silence(&self, chunk: &[i16]) -> usize {
        chunk.iter().rev().take_while(|&&s| !self.is_loud(s)).count()
    }

    /// Cut leading and trailing silent windows.
    ///
    /// Returns a sub-slice of `audio`; an all-silent input yields an empty
    /// slice.
    pub fn trim_silence<'a>(&self, audio: &'a [i16]) -> &'a [i16] {
        let windows: Vec<&[i16]> = audio.chunks(self.window).collect();
        let voiced = |w: &&[i16]| !self.is_silent(w);

        let Some(first) = windows.iter().position(voiced) else {
            return &audio[..0];
        };
        let last = windows.iter().rposition(voiced).unwrap_or(first);

        let start = first * self.window;
        let end = ((last + 1) * self.window).min(audio.len());
        &audio[start..end]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
