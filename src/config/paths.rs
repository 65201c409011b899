//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Linux:   ~/.config/voice-command/
//!   macOS:   ~/Library/Application Support/voice-command/
//!   Windows: %APPDATA%\voice-command\
//!
//! Data dir (trained voice model + the three hotword samples):
//!   Linux:   ~/.local/share/voice-command/
//!   macOS:   ~/Library/Application Support/voice-command/
//!   Windows: %LOCALAPPDATA%\voice-command\
//!
//! Scratch dir: the system temp directory. Fresh recordings and models
//! returned by the training endpoint land there before being moved.

use std::path::{Path, PathBuf};

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Permanent home of the voice model and hotword samples.
    pub data_dir: PathBuf,
    /// Temporary files (recordings, trimmed samples, downloaded models).
    pub scratch_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-command";

    /// Resolves all paths using the `dirs` crate, falling back to the
    /// current directory when the platform has no standard location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            data_dir,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Every path under `root`. Used by tests and portable installs.
    pub fn rooted(root: &Path) -> Self {
        let config_dir = root.join("config");
        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            data_dir: root.join("data"),
            scratch_dir: root.join("tmp"),
        }
    }

    /// Where a trained model is kept once training succeeds. `extension`
    /// comes from the detector engine that will load it.
    pub fn voice_model_file(&self, extension: &str) -> PathBuf {
        self.data_dir.join("voice_model").with_extension(extension)
    }

    /// Permanent location of hotword sample `slot` (0-based).
    pub fn recording_file(&self, slot: usize) -> PathBuf {
        self.data_dir.join(format!("record{}.wav", slot + 1))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
