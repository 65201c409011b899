//! Hotword detector interface.
//!
//! [`HotwordDetector`] classifies one fixed-size frame at a time. It is
//! `Send` so the pipeline can move it into its run loop task, and it never
//! panics on bad input: a wrong frame size or an engine failure comes back
//! as [`Detection::Error`], which the pipeline logs before moving on.
//!
//! Detectors are built by a [`DetectorFactory`] from a [`VoiceModel`], since
//! sensitivity and gain are fixed at load time.

use thiserror::Error;

use super::VoiceModel;
use crate::audio::{AudioFormat, AudioFrame};

// ---------------------------------------------------------------------------
// DetectorError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    #[error("frame has {got} samples, detector expects {expected}")]
    FrameSize { expected: usize, got: usize },

    #[error("frame format {got:?} does not match detector format {expected:?}")]
    FormatMismatch {
        expected: AudioFormat,
        got: AudioFormat,
    },

    #[error("detector engine is not initialised")]
    NotInitialised,

    #[error("failed to load voice model: {0}")]
    Load(String),

    #[error("detector engine error: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Outcome of classifying one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Silence,
    /// A registered hotword fired; indices start at 1.
    Hotword(usize),
    Error(DetectorError),
}

impl Detection {
    pub fn is_hotword(&self) -> bool {
        matches!(self, Self::Hotword(_))
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

pub trait HotwordDetector: Send {
    fn classify(&mut self, frame: &AudioFrame) -> Detection;

    /// Samples per frame expected by [`classify`](Self::classify).
    fn frame_len(&self) -> usize;

    /// Audio format expected by [`classify`](Self::classify).
    fn format(&self) -> AudioFormat;
}

/// Builds a detector for a voice model.
pub trait DetectorFactory: Send + Sync {
    fn load(&self, model: &VoiceModel) -> Result<Box<dyn HotwordDetector>, DetectorError>;

    /// Extension an installed voice model gets for this engine.
    fn model_extension(&self) -> &'static str {
        "pmdl"
    }
}

/// Shared input checks for detector implementations.
pub fn check_frame(
    frame: &AudioFrame,
    expected_len: usize,
    expected_format: AudioFormat,
) -> Result<(), DetectorError> {
    if frame.format() != expected_format {
        return Err(DetectorError::FormatMismatch {
            expected: expected_format,
            got: frame.format(),
        });
    }
    if frame.len() != expected_len {
        return Err(DetectorError::FrameSize {
            expected: expected_len,
            got: frame.len(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MockDetector  (test-only)
// ---------------------------------------------------------------------------

/// Sample value that makes [`MockDetector`] report `Hotword(1)`.
#[cfg(test)]
pub const MOCK_HOTWORD_SAMPLE: i16 = 31_111;

/// Sample value that makes [`MockDetector`] report an engine error.
#[cfg(test)]
pub const MOCK_ERROR_SAMPLE: i16 = -31_111;

/// Test double: fires when a frame contains [`MOCK_HOTWORD_SAMPLE`].
#[cfg(test)]
pub struct MockDetector {
    frame_len: usize,
    format: AudioFormat,
    calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MockDetector {
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            format: AudioFormat::default(),
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> std::sync::Arc<std::sync::atomic::AtomicUsize> {
        std::sync::Arc::clone(&self.calls)
    }
}

#[cfg(test)]
impl HotwordDetector for MockDetector {
    fn classify(&mut self, frame: &AudioFrame) -> Detection {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Err(e) = check_frame(frame, self.frame_len, self.format) {
            return Detection::Error(e);
        }
        if frame.samples().contains(&MOCK_ERROR_SAMPLE) {
            return Detection::Error(DetectorError::Engine("scripted failure".into()));
        }
        if frame.samples().contains(&MOCK_HOTWORD_SAMPLE) {
            return Detection::Hotword(1);
        }
        Detection::Silence
    }

    fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn format(&self) -> AudioFormat {
        self.format
    }
}

/// Factory handing out [`MockDetector`]s, optionally refusing to load.
#[cfg(test)]
pub struct MockDetectorFactory {
    pub frame_len: usize,
    pub fail: bool,
    pub loads: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockDetectorFactory {
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            fail: false,
            loads: Default::default(),
        }
    }
}

#[cfg(test)]
impl DetectorFactory for MockDetectorFactory {
    fn load(&self, _model: &VoiceModel) -> Result<Box<dyn HotwordDetector>, DetectorError> {
        self.loads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail {
            return Err(DetectorError::Load("scripted load failure".into()));
        }
        Ok(Box::new(MockDetector::new(self.frame_len)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>) -> AudioFrame {
        AudioFrame::new(samples, AudioFormat::default())
    }

    #[test]
    fn wrong_frame_size_is_an_error_not_a_panic() {
        let mut det = MockDetector::new(4);
        assert_eq!(
            det.classify(&frame(vec![0; 3])),
            Detection::Error(DetectorError::FrameSize {
                expected: 4,
                got: 3
            })
        );
    }

    #[test]
    fn wrong_format_is_an_error() {
        let mut det = MockDetector::new(2);
        let stereo = AudioFrame::new(vec![0, 0], AudioFormat::new(16_000, 2, 16));
        assert!(matches!(
            det.classify(&stereo),
            Detection::Error(DetectorError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn mock_classifies_by_marker() {
        let mut det = MockDetector::new(3);
        assert_eq!(det.classify(&frame(vec![0, 1, 2])), Detection::Silence);
        assert_eq!(
            det.classify(&frame(vec![0, MOCK_HOTWORD_SAMPLE, 0])),
            Detection::Hotword(1)
        );
        assert!(matches!(
            det.classify(&frame(vec![MOCK_ERROR_SAMPLE, 0, 0])),
            Detection::Error(DetectorError::Engine(_))
        ));
        assert_eq!(det.calls().load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn box_dyn_detector_compiles() {
        let det: Box<dyn HotwordDetector> = Box::new(MockDetector::new(160));
        assert_eq!(det.frame_len(), 160);
        assert_eq!(det.format(), AudioFormat::default());
    }

    #[test]
    fn detection_helpers() {
        assert!(Detection::Hotword(2).is_hotword());
        assert!(!Detection::Silence.is_hotword());
    }
}
