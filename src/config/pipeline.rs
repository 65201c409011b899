//! Immutable per-run configuration of the recognition pipeline.

use std::path::PathBuf;
use std::time::Duration;

use super::{AppConfig, ConfigError};
use crate::hotword::VoiceModel;
use crate::recognition::Credentials;
use crate::recorder::RecordingPolicy;

/// Interval at which the run loop polls an empty audio source.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything one pipeline run needs. Changing any of it means stopping the
/// pipeline and starting a new one.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub voice_model: Option<PathBuf>,
    pub sensitivity: f32,
    pub audio_gain: f32,
    /// Reported as `hotword` in `command.detected`.
    pub hotword_label: String,
    pub credentials: Option<Credentials>,
    pub language: String,
    /// Hotword detections are reported to the control target only and never
    /// start a recording.
    pub test_mode: bool,
    pub recording: RecordingPolicy,
    pub recognition_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::snapshot(&AppConfig::default(), RecordingPolicy::default())
    }
}

impl PipelineConfig {
    /// Snapshot the persisted settings, resolving the selected provider's key.
    ///
    /// Fails when the `[recording]` section holds unusable durations.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let recording = RecordingPolicy::from_config(&config.recording)?;
        Ok(Self::snapshot(config, recording))
    }

    fn snapshot(config: &AppConfig, recording: RecordingPolicy) -> Self {
        let credentials = config.provider.id.and_then(|id| {
            config
                .provider
                .api_key(id)
                .map(|key| Credentials::new(id, key))
        });

        Self {
            voice_model: config.hotword.model.clone(),
            sensitivity: config.hotword.sensitivity,
            audio_gain: config.hotword.audio_gain,
            hotword_label: config.hotword.label.clone(),
            credentials,
            language: config.provider.language.clone(),
            test_mode: false,
            recording,
            recognition_timeout: Duration::from_secs(config.provider.timeout_secs),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Check everything a run depends on and open the voice model.
    ///
    /// Credentials are only required outside test mode.
    pub fn validate(&self) -> Result<VoiceModel, ConfigError> {
        let path = self
            .voice_model
            .as_ref()
            .ok_or(ConfigError::MissingVoiceModel)?;
        let model = VoiceModel::open(path, self.sensitivity, self.audio_gain)?;
        if !self.test_mode && self.credentials.is_none() {
            return Err(ConfigError::MissingProvider);
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolves_selected_provider_key() {
        let mut app = AppConfig::default();
        app.provider.id = Some(0);
        app.provider.set_api_key(0, "k0");
        app.provider.set_api_key(1, "k1");

        let config = PipelineConfig::from_app_config(&app).unwrap();
        let creds = config.credentials.expect("credentials");
        assert_eq!(creds.provider_id(), 0);
        assert_eq!(creds.api_key(), "k0");
        assert_eq!(config.recognition_timeout, Duration::from_secs(10));
        assert_eq!(config.recording.max_duration, Duration::from_secs(5));
    }

    #[test]
    fn no_provider_selected_means_no_credentials() {
        let mut app = AppConfig::default();
        app.provider.set_api_key(0, "k0");
        assert!(PipelineConfig::from_app_config(&app)
            .unwrap()
            .credentials
            .is_none());
    }

    #[test]
    fn infinite_recording_length_is_a_config_error() {
        let mut app = AppConfig::default();
        app.recording.max_secs = f32::INFINITY;
        assert!(matches!(
            PipelineConfig::from_app_config(&app),
            Err(ConfigError::InvalidRecording { field: "max_secs", .. })
        ));
    }

    #[test]
    fn validate_requires_model() {
        let config = PipelineConfig::default();
        assert_eq!(config.validate().unwrap_err(), ConfigError::MissingVoiceModel);
    }

    #[test]
    fn validate_requires_credentials_unless_testing() {
        let dir = tempdir().unwrap();
        let model = dir.path().join("m.pmdl");
        std::fs::write(&model, b"model").unwrap();

        let mut config = PipelineConfig {
            voice_model: Some(model),
            ..PipelineConfig::default()
        };
        assert_eq!(config.validate().unwrap_err(), ConfigError::MissingProvider);

        config.test_mode = true;
        assert!(config.validate().is_ok());

        config.test_mode = false;
        config.credentials = Some(Credentials::new(0, "key"));
        assert!(config.validate().is_ok());
    }
}
