//! Hotword-triggered voice commands.
//!
//! The microphone is fed to a hotword detector; after a detection the
//! following command is recorded, sent to a remote speech-to-text provider
//! and the transcript is emitted as a `command.detected` event. A personal
//! hotword model is obtained by recording three samples and submitting them
//! to a training service.
//!
//! [`service::SpeechService`] ties the pieces together.

pub mod audio;
pub mod config;
pub mod events;
pub mod hotword;
pub mod pipeline;
pub mod recognition;
pub mod recorder;
pub mod resource;
pub mod service;
pub mod training;

#[cfg(test)]
mod testing;
