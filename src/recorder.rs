//! Command capture after a hotword.
//!
//! A [`RecordingSession`] accumulates frames until one of these holds:
//!
//! * the captured audio reaches the maximum duration,
//! * the same amount of wall-clock time has passed since the session began
//!   (guards against a source that stops delivering), or
//! * speech has been heard and is followed by at least `min_silence` of
//!   quiet audio.
//!
//! Audio past the maximum is never accepted, so a clip can not outgrow it.
//! [`CommandRecorder::finish`] trims leading and trailing silence with the
//! same threshold before handing the clip on.

use std::time::{Duration, Instant};

use crate::audio::{AudioClip, AudioFormat, AudioFrame, SilenceDetector};
use crate::config::{ConfigError, RecordingConfig};

// ---------------------------------------------------------------------------
// RecordingPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingPolicy {
    pub max_duration: Duration,
    /// Fraction of full scale below which a sample is silence.
    pub silence_threshold: f32,
    pub min_silence: Duration,
}

impl Default for RecordingPolicy {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(5),
            silence_threshold: 0.10,
            min_silence: Duration::from_millis(100),
        }
    }
}

impl RecordingPolicy {
    /// Refuses values that are not finite, not positive or too long.
    pub fn from_config(config: &RecordingConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            max_duration: config.max_duration()?,
            silence_threshold: config.checked_silence_threshold()?,
            min_silence: config.min_silence()?,
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// Why a session stopped accepting audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    MaxDuration,
    WallClock,
    TrailingSilence,
}

/// State of one command capture. At most one exists per pipeline.
#[derive(Debug)]
pub struct RecordingSession {
    started: Instant,
    samples: Vec<i16>,
    speech_seen: bool,
    /// Consecutive quiet samples at the end of `samples`.
    trailing_silence: usize,
}

impl RecordingSession {
    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn speech_seen(&self) -> bool {
        self.speech_seen
    }

    pub fn trailing_silence(&self) -> usize {
        self.trailing_silence
    }
}

// ---------------------------------------------------------------------------
// CommandRecorder
// ---------------------------------------------------------------------------

pub struct CommandRecorder {
    policy: RecordingPolicy,
    format: AudioFormat,
    silence: SilenceDetector,
    max_samples: usize,
}

impl CommandRecorder {
    pub fn new(policy: RecordingPolicy, format: AudioFormat) -> Self {
        Self {
            silence: SilenceDetector::for_format(
                policy.silence_threshold,
                policy.min_silence,
                format,
            ),
            max_samples: format.samples_for(policy.max_duration),
            policy,
            format,
        }
    }

    pub fn policy(&self) -> &RecordingPolicy {
        &self.policy
    }

    pub fn begin_recording(&self) -> RecordingSession {
        RecordingSession {
            started: Instant::now(),
            samples: Vec::with_capacity(self.max_samples),
            speech_seen: false,
            trailing_silence: 0,
        }
    }

    /// Append `frame`, dropping whatever would exceed the maximum duration.
    pub fn feed(&self, frame: &AudioFrame, session: &mut RecordingSession) {
        let room = self.max_samples.saturating_sub(session.samples.len());
        let accepted = &frame.samples()[..frame.len().min(room)];
        if accepted.is_empty() {
            return;
        }

        if self.silence.is_silent(accepted) {
            session.trailing_silence += accepted.len();
        } else {
            session.speech_seen = true;
            session.trailing_silence = self.silence.trailing_silence(accepted);
        }
        session.samples.extend_from_slice(accepted);
    }

    pub fn completion(&self, session: &RecordingSession) -> Option<Completion> {
        if session.samples.len() >= self.max_samples {
            Some(Completion::MaxDuration)
        } else if session.started.elapsed() >= self.policy.max_duration {
            Some(Completion::WallClock)
        } else if session.speech_seen && session.trailing_silence >= self.silence.window() {
            Some(Completion::TrailingSilence)
        } else {
            None
        }
    }

    pub fn is_complete(&self, session: &RecordingSession) -> bool {
        self.completion(session).is_some()
    }

    /// Close the session and return the trimmed clip. Empty when nothing,
    /// or nothing but silence, was captured.
    pub fn finish(&self, session: RecordingSession) -> AudioClip {
        let trimmed = self.silence.trim_silence(&session.samples);
        log::debug!(
            "recorder: captured {} samples, kept {} after trimming",
            session.samples.len(),
            trimmed.len()
        );
        AudioClip::new(trimmed.to_vec(), self.format)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
