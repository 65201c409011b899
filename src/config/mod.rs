//! Configuration for the voice command service.
//!
//! Provides `AppConfig` (persisted settings) with its sections, `AppPaths`
//! for platform data directories, `PipelineConfig` (the immutable snapshot a
//! pipeline run is started with) and `ConfigError`.

pub mod paths;
pub mod pipeline;
pub mod settings;

use std::path::PathBuf;

use thiserror::Error;

pub use paths::AppPaths;
pub use pipeline::{PipelineConfig, DEFAULT_POLL_INTERVAL};
pub use settings::{
    AppConfig, HotwordConfig, HotwordFiles, ProviderConfig, RecordingConfig, TrainingConfig,
    HOTWORD_SAMPLES,
};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A configuration that cannot be used as-is.
///
/// Returned by validation; the pipeline turns it into a refused start rather
/// than a failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("service is disabled")]
    ServiceDisabled,

    #[error("no voice model configured")]
    MissingVoiceModel,

    #[error("voice model not found: {}", .0.display())]
    VoiceModelNotFound(PathBuf),

    #[error("voice model is empty: {}", .0.display())]
    EmptyVoiceModel(PathBuf),

    #[error("sensitivity {0} is outside 0.0..=1.0")]
    InvalidSensitivity(f32),

    #[error("recording setting {field} = {value} is out of range")]
    InvalidRecording { field: &'static str, value: f32 },

    #[error("no speech provider configured")]
    MissingProvider,

    #[error("unknown speech provider {0}")]
    UnknownProvider(u32),

    #[error("speech provider {0:?} is not available")]
    ProviderDisabled(String),

    #[error("no API key for speech provider {0:?}")]
    MissingApiKey(String),
}
