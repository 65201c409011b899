//! The personal voice model a detector is built from.

use std::path::{Path, PathBuf};

use crate::audio::AudioFormat;
use crate::config::ConfigError;

/// A voice model file plus its load-time tuning.
///
/// The file itself is opaque; only its presence and non-emptiness are
/// checked here. Read-only once opened.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceModel {
    path: PathBuf,
    sensitivity: f32,
    audio_gain: f32,
    format: AudioFormat,
}

impl VoiceModel {
    /// Validate `path` and the tuning parameters.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::VoiceModelNotFound`] when the file does not exist.
    /// - [`ConfigError::EmptyVoiceModel`] when it has no content.
    /// - [`ConfigError::InvalidSensitivity`] outside `0.0..=1.0`.
    pub fn open(path: &Path, sensitivity: f32, audio_gain: f32) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&sensitivity) {
            return Err(ConfigError::InvalidSensitivity(sensitivity));
        }
        let meta = std::fs::metadata(path)
            .map_err(|_| ConfigError::VoiceModelNotFound(path.to_path_buf()))?;
        if !meta.is_file() {
            return Err(ConfigError::VoiceModelNotFound(path.to_path_buf()));
        }
        if meta.len() == 0 {
            return Err(ConfigError::EmptyVoiceModel(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            sensitivity,
            audio_gain,
            format: AudioFormat::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn audio_gain(&self) -> f32 {
        self.audio_gain
    }

    /// Format the model was trained for.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Detection score threshold derived from sensitivity.
    pub fn threshold(&self) -> f32 {
        1.0 - self.sensitivity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn opens_existing_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice.pmdl");
        std::fs::write(&path, b"\x01\x02").unwrap();

        let model = VoiceModel::open(&path, 0.45, 1.2).unwrap();
        assert_eq!(model.path(), path);
        assert!((model.threshold() - 0.55).abs() < 1e-6);
        assert_eq!(model.audio_gain(), 1.2);
        assert_eq!(model.format(), AudioFormat::default());
    }

    #[test]
    fn missing_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.pmdl");
        assert_eq!(
            VoiceModel::open(&path, 0.5, 1.0).unwrap_err(),
            ConfigError::VoiceModelNotFound(path)
        );
    }

    #[test]
    fn directory_is_not_a_model() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            VoiceModel::open(dir.path(), 0.5, 1.0),
            Err(ConfigError::VoiceModelNotFound(_))
        ));
    }

    #[test]
    fn empty_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.pmdl");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(
            VoiceModel::open(&path, 0.5, 1.0).unwrap_err(),
            ConfigError::EmptyVoiceModel(path)
        );
    }

    #[test]
    fn sensitivity_out_of_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice.pmdl");
        std::fs::write(&path, b"x").unwrap();
        assert_eq!(
            VoiceModel::open(&path, 1.5, 1.0).unwrap_err(),
            ConfigError::InvalidSensitivity(1.5)
        );
    }
}
