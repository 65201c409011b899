//! Hotword (wake word) detection.
//!
//! # Architecture
//!
//! ```text
//! VoiceModel (file + sensitivity + gain)
//!      │
//!      ▼
//! DetectorFactory::load ──▶ Box<dyn HotwordDetector>
//!                                 │
//!         AudioFrame (frame_len) ─┴─▶ classify ──▶ Silence | Hotword(n) | Error
//! ```

pub mod detector;
pub mod model;
#[cfg(feature = "wake-word")]
pub mod wakeword;

pub use detector::{Detection, DetectorError, DetectorFactory, HotwordDetector};
pub use model::VoiceModel;
#[cfg(feature = "wake-word")]
pub use wakeword::{WakeWordDetector, WakeWordFactory};

#[cfg(test)]
pub use detector::{MockDetector, MockDetectorFactory, MOCK_ERROR_SAMPLE, MOCK_HOTWORD_SAMPLE};
