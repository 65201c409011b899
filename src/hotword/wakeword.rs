//! Local wake word engine backed by `rustpotter`.
//!
//! Only compiled with the `wake-word` feature (on by default). The engine
//! consumes `f32` frames, so each `i16` frame is gained, converted and handed
//! to [`rustpotter::Rustpotter::process_samples`].

use rustpotter::{Rustpotter, RustpotterConfig, SampleFormat};

use super::detector::check_frame;
use super::{Detection, DetectorError, DetectorFactory, HotwordDetector, VoiceModel};
use crate::audio::{apply_gain, i16_to_f32, AudioFormat, AudioFrame};

// ---------------------------------------------------------------------------
// WakeWordDetector
// ---------------------------------------------------------------------------

pub struct WakeWordDetector {
    engine: Rustpotter,
    /// Registered wake word keys; a detection's index is its position + 1.
    keys: Vec<String>,
    frame_len: usize,
    format: AudioFormat,
    gain: f32,
}

impl WakeWordDetector {
    /// Load `model` into a fresh engine configured for its format.
    pub fn load(model: &VoiceModel) -> Result<Self, DetectorError> {
        let format = model.format();
        let mut config = RustpotterConfig::default();
        config.fmt.sample_rate = format.sample_rate as usize;
        config.fmt.channels = 1;
        config.fmt.sample_format = SampleFormat::F32;
        config.detector.threshold = model.threshold();

        let mut engine =
            Rustpotter::new(&config).map_err(|e| DetectorError::Load(e.to_string()))?;

        let path = model.path().to_str().ok_or_else(|| {
            DetectorError::Load(format!(
                "model path contains non-UTF-8 characters: {}",
                model.path().display()
            ))
        })?;
        let key = model
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "hotword".into());
        engine
            .add_wakeword_from_file(&key, path)
            .map_err(|e| DetectorError::Load(e.to_string()))?;

        let frame_len = engine.get_samples_per_frame();
        log::info!(
            "hotword: loaded {} (threshold {:.2}, {frame_len} samples/frame)",
            model.path().display(),
            model.threshold()
        );

        Ok(Self {
            engine,
            keys: vec![key],
            frame_len,
            format,
            gain: model.audio_gain(),
        })
    }
}

impl HotwordDetector for WakeWordDetector {
    fn classify(&mut self, frame: &AudioFrame) -> Detection {
        if self.frame_len == 0 {
            return Detection::Error(DetectorError::NotInitialised);
        }
        if let Err(e) = check_frame(frame, self.frame_len, self.format) {
            return Detection::Error(e);
        }

        let samples = i16_to_f32(&apply_gain(frame.samples(), self.gain));
        match self.engine.process_samples::<f32>(samples) {
            Some(detection) => {
                let index = self
                    .keys
                    .iter()
                    .position(|k| *k == detection.name)
                    .map_or(1, |i| i + 1);
                log::debug!("hotword: {} detected (index {index})", detection.name);
                Detection::Hotword(index)
            }
            None => Detection::Silence,
        }
    }

    fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn format(&self) -> AudioFormat {
        self.format
    }
}

// ---------------------------------------------------------------------------
// WakeWordFactory
// ---------------------------------------------------------------------------

/// Production [`DetectorFactory`].
#[derive(Debug, Default, Clone, Copy)]
pub struct WakeWordFactory;

impl DetectorFactory for WakeWordFactory {
    fn load(&self, model: &VoiceModel) -> Result<Box<dyn HotwordDetector>, DetectorError> {
        Ok(Box::new(WakeWordDetector::load(model)?))
    }

    fn model_extension(&self) -> &'static str {
        "rpw"
    }
}
