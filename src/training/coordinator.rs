//! Single-flight training jobs.
//!
//! [`TrainingCoordinator::train`] validates its inputs, claims the busy flag
//! and returns; the job itself runs on a tokio task and reports through the
//! callback. Files produced along the way all live in the scratch directory:
//!
//! ```text
//! record{1,2,3}.wav ──trim──▶ <scratch>/<uuid>.wav ×3 ──POST──▶ <scratch>/<uuid>.pmdl
//!                                     │
//!                                     └── deleted when the job ends
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::{TrainingEndpoint, TrainingError};
use crate::audio::trim_wav_file;
use crate::config::HOTWORD_SAMPLES;

pub struct TrainingCoordinator {
    endpoint: Arc<dyn TrainingEndpoint>,
    scratch_dir: PathBuf,
    silence_threshold: f32,
    min_silence: Duration,
    busy: Arc<AtomicBool>,
}

impl TrainingCoordinator {
    pub fn new(
        endpoint: Arc<dyn TrainingEndpoint>,
        scratch_dir: impl Into<PathBuf>,
        silence_threshold: f32,
        min_silence: Duration,
    ) -> Self {
        Self {
            endpoint,
            scratch_dir: scratch_dir.into(),
            silence_threshold,
            min_silence,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_training(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start a training job. Must be called from within a tokio runtime.
    ///
    /// Errors are returned directly only when the job could not be started;
    /// everything after that goes to `on_done`, which runs once the busy
    /// flag has been cleared.
    pub fn train<F>(
        &self,
        recordings: [PathBuf; HOTWORD_SAMPLES],
        label: &str,
        token: &str,
        on_done: F,
    ) -> Result<(), TrainingError>
    where
        F: FnOnce(Result<PathBuf, TrainingError>) + Send + 'static,
    {
        if self.is_training() {
            return Err(TrainingError::InProgress);
        }
        if label.trim().is_empty() {
            return Err(TrainingError::EmptyLabel);
        }
        if token.trim().is_empty() {
            return Err(TrainingError::EmptyToken);
        }
        if let Some(missing) = recordings.iter().find(|p| !p.is_file()) {
            return Err(TrainingError::MissingRecording(missing.clone()));
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TrainingError::InProgress);
        }

        let job = TrainingJob {
            endpoint: Arc::clone(&self.endpoint),
            scratch_dir: self.scratch_dir.clone(),
            silence_threshold: self.silence_threshold,
            min_silence: self.min_silence,
            recordings,
            label: label.to_string(),
            token: token.to_string(),
        };
        let busy = BusyGuard(Arc::clone(&self.busy));

        log::info!("training: job started for hotword {label:?}");
        tokio::spawn(async move {
            let result = job.run().await;
            drop(busy);
            match &result {
                Ok(path) => log::info!("training: model written to {}", path.display()),
                Err(e) => log::warn!("training: failed: {e}"),
            }
            on_done(result);
        });
        Ok(())
    }
}

/// Clears the busy flag however the job ends.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// TrainingJob
// ---------------------------------------------------------------------------

struct TrainingJob {
    endpoint: Arc<dyn TrainingEndpoint>,
    scratch_dir: PathBuf,
    silence_threshold: f32,
    min_silence: Duration,
    recordings: [PathBuf; HOTWORD_SAMPLES],
    label: String,
    token: String,
}

impl TrainingJob {
    async fn run(self) -> Result<PathBuf, TrainingError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let mut temporaries = Vec::with_capacity(HOTWORD_SAMPLES);
        let result = self.submit(&mut temporaries).await;
        for path in &temporaries {
            remove_scratch_file(path).await;
        }
        result
    }

    async fn submit(&self, temporaries: &mut Vec<PathBuf>) -> Result<PathBuf, TrainingError> {
        let mut samples: [Vec<u8>; HOTWORD_SAMPLES] = Default::default();
        for (sample, recording) in samples.iter_mut().zip(&self.recordings) {
            let trimmed = self.scratch_dir.join(format!("{}.wav", Uuid::new_v4()));
            temporaries.push(trimmed.clone());
            let source = self.trimmed_or_original(recording, &trimmed).await;
            *sample = tokio::fs::read(source).await?;
        }

        let model = self
            .endpoint
            .train(&self.label, &self.token, samples)
            .await?;
        if model.is_empty() {
            return Err(TrainingError::EmptyModel);
        }

        let path = self.scratch_dir.join(format!("{}.pmdl", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&path, &model).await {
            remove_scratch_file(&path).await;
            return Err(e.into());
        }
        Ok(path)
    }

    /// Trim `recording` into `scratch`, or fall back to the untouched file.
    async fn trimmed_or_original<'a>(&self, recording: &'a Path, scratch: &'a Path) -> &'a Path {
        let trimmed = trim_blocking(
            recording.to_path_buf(),
            scratch.to_path_buf(),
            self.silence_threshold,
            self.min_silence,
        )
        .await;
        match trimmed {
            Ok(0) => {
                log::warn!(
                    "training: {} is silent after trimming, sending it as is",
                    recording.display()
                );
                recording
            }
            Ok(kept) => {
                log::debug!("training: trimmed {} to {kept} samples", recording.display());
                scratch
            }
            Err(e) => {
                log::warn!(
                    "training: cannot trim {} ({e}), sending it as is",
                    recording.display()
                );
                recording
            }
        }
    }
}

/// [`trim_wav_file`] on the blocking pool. Returns the samples kept.
async fn trim_blocking(
    recording: PathBuf,
    scratch: PathBuf,
    silence_threshold: f32,
    min_silence: Duration,
) -> Result<usize, String> {
    tokio::task::spawn_blocking(move || {
        trim_wav_file(&recording, &scratch, silence_threshold, min_silence)
    })
    .await
    .map_err(|e| format!("trim task failed: {e}"))?
    .map_err(|e| e.to_string())
}

async fn remove_scratch_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("training: cannot delete {}: {e}", path.display()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
