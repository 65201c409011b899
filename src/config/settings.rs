//! Persisted settings, defaults and TOML persistence.
//!
//! Every section derives `Default` and is marked `#[serde(default)]`, so a
//! partial `settings.toml` loads with the missing keys filled in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{AppPaths, ConfigError};

/// Number of hotword samples needed to train a voice model.
pub const HOTWORD_SAMPLES: usize = 3;

// ---------------------------------------------------------------------------
// HotwordFiles
// ---------------------------------------------------------------------------

/// The three recorded hotword samples, by slot.
///
/// Kept as named fields rather than an array so an unrecorded slot is simply
/// absent from the TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotwordFiles {
    pub record1: Option<PathBuf>,
    pub record2: Option<PathBuf>,
    pub record3: Option<PathBuf>,
}

impl HotwordFiles {
    pub fn get(&self, slot: usize) -> Option<&Path> {
        match slot {
            0 => self.record1.as_deref(),
            1 => self.record2.as_deref(),
            2 => self.record3.as_deref(),
            _ => None,
        }
    }

    /// Store `path` in `slot`; out-of-range slots are ignored.
    pub fn set(&mut self, slot: usize, path: Option<PathBuf>) {
        match slot {
            0 => self.record1 = path,
            1 => self.record2 = path,
            2 => self.record3 = path,
            _ => {}
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Recording status per slot: a slot counts only when it and every slot
    /// before it is configured and present on disk.
    pub fn status(&self) -> [bool; HOTWORD_SAMPLES] {
        let mut status = [false; HOTWORD_SAMPLES];
        for (slot, recorded) in status.iter_mut().enumerate() {
            let present = self.get(slot).is_some_and(Path::exists);
            if !present {
                break;
            }
            *recorded = true;
        }
        status
    }

    /// First slot that does not count as recorded, if any.
    pub fn next_free_slot(&self) -> Option<usize> {
        self.status().iter().position(|recorded| !recorded)
    }

    /// All three paths, once every slot is recorded.
    pub fn complete(&self) -> Option<[PathBuf; HOTWORD_SAMPLES]> {
        if self.next_free_slot().is_some() {
            return None;
        }
        Some([
            self.record1.clone()?,
            self.record2.clone()?,
            self.record3.clone()?,
        ])
    }
}

// ---------------------------------------------------------------------------
// HotwordConfig
// ---------------------------------------------------------------------------

/// Wake word model, its training inputs and detector tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotwordConfig {
    /// API token of the training service.
    pub token: Option<String>,
    pub files: HotwordFiles,
    /// Trained personal voice model in use.
    pub model: Option<PathBuf>,
    /// 0.0–1.0; higher detects more readily (and misfires more often).
    pub sensitivity: f32,
    /// Multiplier applied to samples before detection.
    pub audio_gain: f32,
    /// Name reported with `command.detected` and sent when training.
    pub label: String,
}

impl Default for HotwordConfig {
    fn default() -> Self {
        Self {
            token: None,
            files: HotwordFiles::default(),
            model: None,
            sensitivity: 0.45,
            audio_gain: 1.0,
            label: "hotword".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

/// Speech-to-text provider selection and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Selected provider id (see [`crate::recognition::PROVIDERS`]).
    pub id: Option<u32>,
    /// API key per provider id. TOML keys are strings, so ids are stored as
    /// their decimal text.
    pub api_keys: BTreeMap<String, String>,
    /// Recognition language tag (e.g. `"en-US"`, `"fr-FR"`).
    pub language: String,
    /// Override for the provider's REST endpoint.
    pub endpoint: Option<String>,
    /// Seconds to wait for a transcription before giving up.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: None,
            api_keys: BTreeMap::new(),
            language: "en-US".into(),
            endpoint: None,
            timeout_secs: 10,
        }
    }
}

impl ProviderConfig {
    pub fn api_key(&self, id: u32) -> Option<&str> {
        self.api_keys
            .get(&id.to_string())
            .map(String::as_str)
            .filter(|k| !k.trim().is_empty())
    }

    pub fn set_api_key(&mut self, id: u32, key: impl Into<String>) {
        self.api_keys.insert(id.to_string(), key.into());
    }

    /// Key of the selected provider, if both are set.
    pub fn active_key(&self) -> Option<&str> {
        self.id.and_then(|id| self.api_key(id))
    }
}

// ---------------------------------------------------------------------------
// RecordingConfig
// ---------------------------------------------------------------------------

/// Command capture and sample recording bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Longest command accepted after a hotword, in seconds.
    pub max_secs: f32,
    /// Fraction of full scale below which audio is silence.
    pub silence_threshold: f32,
    /// Trailing silence that ends a command, in seconds.
    pub min_silence_secs: f32,
    /// Length of one hotword training sample, in seconds.
    pub sample_secs: f32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_secs: 5.0,
            silence_threshold: 0.10,
            min_silence_secs: 0.1,
            sample_secs: 5.0,
        }
    }
}

impl RecordingConfig {
    /// Upper bound for every duration in this section, in seconds.
    pub const MAX_SECS: f32 = 60.0;

    pub fn max_duration(&self) -> Result<Duration, ConfigError> {
        seconds("max_secs", self.max_secs)
    }

    pub fn min_silence(&self) -> Result<Duration, ConfigError> {
        seconds("min_silence_secs", self.min_silence_secs)
    }

    pub fn sample_length(&self) -> Result<Duration, ConfigError> {
        seconds("sample_secs", self.sample_secs)
    }

    pub fn checked_silence_threshold(&self) -> Result<f32, ConfigError> {
        if (0.0..=1.0).contains(&self.silence_threshold) {
            Ok(self.silence_threshold)
        } else {
            Err(ConfigError::InvalidRecording {
                field: "silence_threshold",
                value: self.silence_threshold,
            })
        }
    }
}

/// Positive, finite and at most [`RecordingConfig::MAX_SECS`].
fn seconds(field: &'static str, value: f32) -> Result<Duration, ConfigError> {
    let invalid = ConfigError::InvalidRecording { field, value };
    if !(value > 0.0 && value <= RecordingConfig::MAX_SECS) {
        return Err(invalid);
    }
    Duration::try_from_secs_f32(value).map_err(|_| invalid)
}

// ---------------------------------------------------------------------------
// TrainingConfig
// ---------------------------------------------------------------------------

/// Remote voice model training service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub endpoint: String,
    pub microphone: String,
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://snowboy.kitt.ai/api/v1/train/".into(),
            microphone: "raspberry".into(),
            language: "ot".into(),
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_command::config::AppConfig;
///
/// let mut config = AppConfig::load().unwrap();
/// config.provider.language = "fr-FR".into();
/// config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// When false the pipeline only runs for hotword tests.
    pub service_enabled: bool,
    pub hotword: HotwordConfig,
    pub provider: ProviderConfig,
    pub recording: RecordingConfig,
    pub training: TrainingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_enabled: true,
            hotword: HotwordConfig::default(),
            provider: ProviderConfig::default(),
            recording: RecordingConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the platform `settings.toml`; a missing file yields the
    /// defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to the platform `settings.toml`, creating parent directories.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
