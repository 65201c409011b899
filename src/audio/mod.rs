//! Audio plumbing: microphone capture → conversion → ring buffer, plus the
//! silence detector and WAV codec used by the recorder and training.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → stereo_to_mono → resample → f32_to_i16
//!           → RingBuffer → AudioSource::read → AudioFrame
//! ```

pub mod buffer;
pub mod capture;
pub mod format;
pub mod resample;
pub mod vad;
pub mod wav;

pub use buffer::RingBuffer;
pub use capture::{AudioSource, DeviceError, MicrophoneSource, DEFAULT_BUFFER_DURATION};
pub use format::{AudioClip, AudioFormat, AudioFrame};
pub use resample::{apply_gain, f32_to_i16, i16_to_f32, resample, stereo_to_mono};
pub use vad::{SilenceDetector, DEFAULT_MIN_SILENCE, DEFAULT_SILENCE_THRESHOLD};
pub use wav::{clip_to_wav, encode_wav, read_wav, trim_wav_file, write_wav, WavError};

#[cfg(test)]
pub use capture::{MockAudioControl, MockAudioSource};
