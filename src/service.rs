//! Service layer: owns the settings, the live pipeline and hotword training.
//!
//! [`SpeechService`] is what `main` (or any other front end) drives. It
//! decides when the pipeline may run, rebuilds it whenever settings change,
//! records hotword samples and installs freshly trained voice models.
//!
//! Settings sit behind `Arc<Mutex<AppConfig>>` because training completes on
//! a tokio task and updates them from there.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::audio::{write_wav, AudioFormat, AudioSource, DeviceError, WavError};
use crate::config::{
    AppConfig, AppPaths, ConfigError, HotwordFiles, PipelineConfig, DEFAULT_POLL_INTERVAL,
    HOTWORD_SAMPLES,
};
use crate::events::{Event, EventSink, EventTarget};
use crate::hotword::{DetectorError, DetectorFactory, VoiceModel};
use crate::pipeline::{PipelineServices, PipelineStatus, RecognitionPipeline};
use crate::recognition::{validate_selection, PROVIDERS};
use crate::recorder::RecordingPolicy;
use crate::resource::AUDIO_CAPTURE;
use crate::training::{TrainingCoordinator, TrainingEndpoint, TrainingError};

/// Pause between stopping and starting again after a settings change.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(10);

/// Builds a fresh audio source for every pipeline run and sample recording.
pub type SourceFactory = Box<dyn Fn() -> Box<dyn AudioSource> + Send + Sync>;

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error("audio file error: {0}")]
    Wav(#[from] WavError),

    #[error("not allowed while a voice model is being trained")]
    TrainingInProgress,

    #[error("all hotword samples are already recorded")]
    SamplesComplete,

    #[error("hotword samples incomplete ({0} recorded)")]
    SamplesIncomplete(usize),

    #[error("no audio captured")]
    NoAudio,

    #[error("trained voice model is not usable by the hotword engine: {0}")]
    IncompatibleModel(DetectorError),

    #[error("failed to save settings: {0}")]
    Persist(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// ServiceStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: u32,
    pub name: &'static str,
    pub enabled: bool,
    pub api_key: Option<String>,
}

/// Snapshot for the control interface.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub service_enabled: bool,
    pub providers: Vec<ProviderStatus>,
    pub provider_id: Option<u32>,
    /// Per slot: recorded and present on disk.
    pub records: [bool; HOTWORD_SAMPLES],
    pub model_present: bool,
    pub running: bool,
    pub testing: bool,
    pub training: bool,
    /// Pipeline state label, `None` when no pipeline was built yet.
    pub pipeline: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// SpeechService
// ---------------------------------------------------------------------------

pub struct SpeechService {
    config: Arc<Mutex<AppConfig>>,
    paths: AppPaths,
    sources: SourceFactory,
    services: PipelineServices,
    trainer: TrainingCoordinator,
    pipeline: Option<RecognitionPipeline>,
    testing: bool,
    /// The running pipeline was started by `start_hotword_test`.
    test_started_pipeline: bool,
    restart_delay: Duration,
}

impl SpeechService {
    pub fn new(
        config: AppConfig,
        paths: AppPaths,
        sources: SourceFactory,
        services: PipelineServices,
        training: Arc<dyn TrainingEndpoint>,
    ) -> Self {
        let trim = RecordingPolicy::from_config(&config.recording).unwrap_or_else(|e| {
            log::warn!("service: {e}; samples are trimmed with the default settings");
            RecordingPolicy::default()
        });
        let trainer = TrainingCoordinator::new(
            training,
            paths.scratch_dir.clone(),
            trim.silence_threshold,
            trim.min_silence,
        );
        Self {
            config: Arc::new(Mutex::new(config)),
            paths,
            sources,
            services,
            trainer,
            pipeline: None,
            testing: false,
            test_started_pipeline: false,
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Copy of the current settings.
    pub fn config(&self) -> AppConfig {
        self.lock_config().clone()
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|p| p.is_running())
    }

    pub fn is_testing(&self) -> bool {
        self.testing
    }

    pub fn is_training(&self) -> bool {
        self.trainer.is_training()
    }

    pub fn pipeline_status(&self) -> Option<PipelineStatus> {
        self.pipeline.as_ref().map(|p| p.status())
    }

    fn lock_config(&self) -> MutexGuard<'_, AppConfig> {
        lock(&self.config)
    }

    fn update_config(&self, f: impl FnOnce(&mut AppConfig)) -> Result<(), ServiceError> {
        let mut config = self.lock_config();
        f(&mut config);
        config.save_to(&self.paths.settings_file)?;
        Ok(())
    }

    // ---- pipeline lifecycle --------------------------------------------

    /// Build and start a pipeline from the current settings.
    ///
    /// `Ok(false)` when a precondition is not met: service disabled (unless
    /// testing), already running, no voice model on disk, or no provider
    /// configured (unless testing).
    pub fn start(&mut self) -> Result<bool, ServiceError> {
        let config = self.config();

        if !config.service_enabled && !self.testing {
            log::info!("service: not starting, service is disabled");
            return Ok(false);
        }
        if self.is_running() {
            log::debug!("service: pipeline already running");
            return Ok(false);
        }
        if !config.hotword.model.as_deref().is_some_and(Path::is_file) {
            log::warn!("service: not starting, no voice model (record and train a hotword first)");
            return Ok(false);
        }
        if !self.testing && config.provider.active_key().is_none() {
            log::warn!("service: not starting, no speech provider configured");
            return Ok(false);
        }

        let mut pipeline_config = match PipelineConfig::from_app_config(&config) {
            Ok(pipeline_config) => pipeline_config,
            Err(e) => {
                log::warn!("service: not starting, {e}");
                return Ok(false);
            }
        };
        pipeline_config.test_mode = self.testing;

        let mut pipeline =
            RecognitionPipeline::new(pipeline_config, (self.sources)(), self.services.clone());
        let started = pipeline.start()?;
        if started {
            self.pipeline = Some(pipeline);
        }
        Ok(started)
    }

    pub async fn stop(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.stop().await;
        }
        self.test_started_pipeline = false;
    }

    /// Stop, wait for the restart delay, start again.
    pub async fn restart(&mut self) -> Result<bool, ServiceError> {
        self.stop().await;
        log::info!("service: restarting in {:?}", self.restart_delay);
        tokio::time::sleep(self.restart_delay).await;
        self.start()
    }

    pub async fn enable_service(&mut self) -> Result<bool, ServiceError> {
        self.update_config(|c| c.service_enabled = true)?;
        self.start()
    }

    pub async fn disable_service(&mut self) -> Result<(), ServiceError> {
        self.update_config(|c| c.service_enabled = false)?;
        if !self.testing {
            self.stop().await;
        }
        Ok(())
    }

    // ---- provider ------------------------------------------------------

    /// Select a speech provider and store its key. A running pipeline is
    /// restarted to pick the change up.
    pub async fn set_provider(&mut self, id: u32, api_key: &str) -> Result<(), ServiceError> {
        let provider = validate_selection(id, api_key)?;
        self.update_config(|c| {
            c.provider.id = Some(id);
            c.provider.set_api_key(id, api_key.trim());
        })?;
        log::info!("service: speech provider set to {}", provider.name);

        if self.is_running() {
            self.restart().await?;
        }
        Ok(())
    }

    // ---- hotword -------------------------------------------------------

    pub fn set_hotword_token(&mut self, token: &str) -> Result<(), ServiceError> {
        if self.is_training() {
            return Err(ServiceError::TrainingInProgress);
        }
        let token = token.trim();
        self.update_config(|c| {
            c.hotword.token = (!token.is_empty()).then(|| token.to_string());
        })
    }

    /// Record the next hotword sample. Returns the slot it went into.
    ///
    /// The pipeline is stopped first since it holds the microphone. Training
    /// is launched automatically once the last slot is filled.
    pub async fn record_hotword(&mut self) -> Result<usize, ServiceError> {
        if self.is_training() {
            return Err(ServiceError::TrainingInProgress);
        }
        let config = self.config();
        let length = config.recording.sample_length()?;
        let slot = config
            .hotword
            .files
            .next_free_slot()
            .ok_or(ServiceError::SamplesComplete)?;

        self.stop().await;

        let broker = Arc::clone(&self.services.broker);
        if !broker.acquire(AUDIO_CAPTURE) {
            return Err(DeviceError::ResourceBusy(AUDIO_CAPTURE.into()).into());
        }
        let format = AudioFormat::default();
        let captured = capture(&self.sources, format, length).await;
        broker.release(AUDIO_CAPTURE);
        let samples = captured?;

        std::fs::create_dir_all(&self.paths.scratch_dir)?;
        let path = self.paths.scratch_dir.join(format!("{}.wav", Uuid::new_v4()));
        write_wav(&path, &samples, format)?;
        log::info!(
            "service: hotword sample {} recorded to {}",
            slot + 1,
            path.display()
        );

        self.update_config(|c| c.hotword.files.set(slot, Some(path)))?;

        if slot + 1 == HOTWORD_SAMPLES {
            self.build_hotword()?;
        }
        Ok(slot)
    }

    /// Send the three recorded samples off for training.
    pub fn build_hotword(&mut self) -> Result<(), ServiceError> {
        let config = self.config();
        let Some(recordings) = config.hotword.files.complete() else {
            let recorded = config.hotword.files.status().iter().filter(|r| **r).count();
            return Err(ServiceError::SamplesIncomplete(recorded));
        };
        let token = config.hotword.token.unwrap_or_default();

        let installer = ModelInstaller {
            config: Arc::clone(&self.config),
            paths: self.paths.clone(),
            events: Arc::clone(&self.services.events),
            detectors: Arc::clone(&self.services.detectors),
            recordings: recordings.clone(),
        };
        self.trainer
            .train(recordings, &config.hotword.label, &token, move |result| {
                installer.finish(result)
            })?;
        Ok(())
    }

    /// Delete the voice model and samples and forget them.
    pub async fn reset_hotword(&mut self) -> Result<(), ServiceError> {
        if self.is_training() {
            return Err(ServiceError::TrainingInProgress);
        }
        self.stop().await;

        let config = self.config();
        let files = (0..HOTWORD_SAMPLES).filter_map(|slot| config.hotword.files.get(slot));
        for path in config.hotword.model.as_deref().into_iter().chain(files) {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("service: cannot delete {}: {e}", path.display());
                }
            }
        }

        self.update_config(|c| {
            c.hotword.model = None;
            c.hotword.files.clear();
        })?;
        log::info!("service: hotword reset");
        Ok(())
    }

    // ---- hotword test --------------------------------------------------

    /// Report detections to the control target only, starting the pipeline
    /// if it was not running.
    pub fn start_hotword_test(&mut self) -> Result<bool, ServiceError> {
        if self.testing {
            return Ok(true);
        }
        self.testing = true;

        if let Some(pipeline) = self.pipeline.as_ref().filter(|p| p.is_running()) {
            pipeline.set_test_mode(true);
            return Ok(true);
        }

        match self.start() {
            Ok(true) => {
                self.test_started_pipeline = true;
                Ok(true)
            }
            other => {
                self.testing = false;
                other
            }
        }
    }

    pub async fn stop_hotword_test(&mut self) {
        if !self.testing {
            return;
        }
        self.testing = false;

        if self.test_started_pipeline {
            self.stop().await;
        } else if let Some(pipeline) = self.pipeline.as_ref() {
            pipeline.set_test_mode(false);
        }
    }

    // ---- status --------------------------------------------------------

    pub fn status(&self) -> ServiceStatus {
        let config = self.config();
        let providers = PROVIDERS
            .iter()
            .map(|p| ProviderStatus {
                id: p.id,
                name: p.name,
                enabled: p.enabled,
                api_key: config.provider.api_key(p.id).map(str::to_string),
            })
            .collect();

        ServiceStatus {
            service_enabled: config.service_enabled,
            providers,
            provider_id: config.provider.id,
            records: config.hotword.files.status(),
            model_present: config.hotword.model.as_deref().is_some_and(Path::is_file),
            running: self.is_running(),
            testing: self.testing,
            training: self.is_training(),
            pipeline: self.pipeline.as_ref().map(|p| p.state().label()),
        }
    }
}

/// Read `length` of audio from a fresh source.
async fn capture(
    sources: &SourceFactory,
    format: AudioFormat,
    length: Duration,
) -> Result<Vec<i16>, ServiceError> {
    let wanted = format.samples_for(length);
    let deadline = Instant::now() + length + Duration::from_secs(1);

    let mut source = sources();
    source.start(format)?;
    let mut samples = Vec::with_capacity(wanted);
    while samples.len() < wanted && Instant::now() < deadline {
        let frame = source.read();
        if frame.is_empty() {
            tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
        } else {
            samples.extend_from_slice(frame.samples());
        }
    }
    source.stop();

    samples.truncate(wanted);
    if samples.is_empty() {
        return Err(ServiceError::NoAudio);
    }
    Ok(samples)
}

fn lock(config: &Mutex<AppConfig>) -> MutexGuard<'_, AppConfig> {
    config.lock().unwrap_or_else(|p| p.into_inner())
}

// ---------------------------------------------------------------------------
// ModelInstaller
// ---------------------------------------------------------------------------

/// Moves a trained model and its samples into the data directory and
/// records them in the settings. A model the detector engine cannot load is
/// discarded and the settings are left alone.
struct ModelInstaller {
    config: Arc<Mutex<AppConfig>>,
    paths: AppPaths,
    events: Arc<dyn EventSink>,
    detectors: Arc<dyn DetectorFactory>,
    recordings: [PathBuf; HOTWORD_SAMPLES],
}

impl ModelInstaller {
    fn finish(self, result: Result<PathBuf, TrainingError>) {
        let outcome = result
            .map_err(|e| e.to_string())
            .and_then(|model| self.install(&model).map_err(|e| e.to_string()));

        match outcome {
            Ok(()) => {
                log::info!("service: voice model installed");
                self.events.emit(Event::TrainingOk, EventTarget::All);
            }
            Err(error) => {
                log::error!("service: voice model training failed: {error}");
                self.events
                    .emit(Event::TrainingKo { error }, EventTarget::All);
            }
        }
    }

    /// Load the model once with the configured engine.
    fn verify(&self, model: &Path) -> Result<(), ServiceError> {
        let (sensitivity, audio_gain) = {
            let config = lock(&self.config);
            (config.hotword.sensitivity, config.hotword.audio_gain)
        };
        let candidate = VoiceModel::open(model, sensitivity, audio_gain)?;
        self.detectors
            .load(&candidate)
            .map_err(ServiceError::IncompatibleModel)?;
        Ok(())
    }

    fn install(&self, model: &Path) -> Result<(), ServiceError> {
        if let Err(e) = self.verify(model) {
            if let Err(rm) = std::fs::remove_file(model) {
                log::warn!("service: cannot delete {}: {rm}", model.display());
            }
            return Err(e);
        }

        std::fs::create_dir_all(&self.paths.data_dir)?;

        let model_path = self
            .paths
            .voice_model_file(self.detectors.model_extension());
        move_file(model, &model_path)?;

        let mut files = HotwordFiles::default();
        for (slot, recording) in self.recordings.iter().enumerate() {
            let target = self.paths.recording_file(slot);
            if recording != &target {
                move_file(recording, &target)?;
            }
            files.set(slot, Some(target));
        }

        let mut config = lock(&self.config);
        config.hotword.model = Some(model_path);
        config.hotword.files = files;
        config.save_to(&self.paths.settings_file)?;
        Ok(())
    }
}

/// Rename, falling back to copy + delete across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    if let Err(e) = std::fs::remove_file(from) {
        log::warn!("service: cannot delete {}: {e}", from.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
