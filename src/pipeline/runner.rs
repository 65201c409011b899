//! The recognition pipeline: hotword → command capture → speech provider.
//!
//! [`RecognitionPipeline`] owns the lifecycle (start / stop / test mode);
//! the work happens in a [`RunLoop`] spawned as a tokio task.
//!
//! # Run loop
//!
//! ```text
//! loop until stop flag:
//!   read source ── empty ──▶ sleep(poll_interval)  (or finish a timed-out recording)
//!        │
//!        ▼
//!   re-slice into detector frames
//!        │
//!        ├─ Listening:  detector.classify(frame)
//!        │     └─ Hotword(n) ─▶ emit hotword.detected ─▶ Recording
//!        │                       (test mode: control target only, stay Listening)
//!        │
//!        └─ Recording:  recorder.feed(frame)
//!              └─ complete ─▶ emit hotword.released ─▶ Recognizing
//!                   └─ timeout(recognizer.recognize)
//!                        ├─ text  ─▶ command.detected
//!                        └─ error ─▶ command.error
//!                   └─ discard buffered audio ─▶ Listening
//! ```
//!
//! The stop flag is checked at every frame boundary. Recognition is bounded
//! by its timeout, so `stop()` never waits longer than that.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::audio::{AudioClip, AudioFrame, AudioSource, DeviceError};
use crate::config::PipelineConfig;
use crate::events::{Event, EventSink, EventTarget};
use crate::hotword::{Detection, DetectorFactory, HotwordDetector};
use crate::recognition::{RecognitionClient, RecognitionError};
use crate::recorder::{CommandRecorder, RecordingSession};
use crate::resource::{ResourceBroker, AUDIO_CAPTURE};

use super::state::{
    new_shared_status, read_status, update_status, PipelineState, PipelineStatus, SharedStatus,
};

// ---------------------------------------------------------------------------
// PipelineServices
// ---------------------------------------------------------------------------

/// Long-lived collaborators shared by every pipeline run.
#[derive(Clone)]
pub struct PipelineServices {
    pub detectors: Arc<dyn DetectorFactory>,
    pub recognizer: Arc<dyn RecognitionClient>,
    pub events: Arc<dyn EventSink>,
    pub broker: Arc<dyn ResourceBroker>,
}

// ---------------------------------------------------------------------------
// RecognitionPipeline
// ---------------------------------------------------------------------------

/// One run of the hotword pipeline.
///
/// ```rust,no_run
/// # use voice_command::pipeline::{PipelineServices, RecognitionPipeline};
/// # use voice_command::config::PipelineConfig;
/// # use voice_command::audio::MicrophoneSource;
/// # async fn example(services: PipelineServices) {
/// let mut pipeline = RecognitionPipeline::new(
///     PipelineConfig::default(),
///     Box::new(MicrophoneSource::default()),
///     services,
/// );
/// if pipeline.start().unwrap() {
///     // ... later
///     pipeline.stop().await;
/// }
/// # }
/// ```
pub struct RecognitionPipeline {
    config: PipelineConfig,
    /// Present while idle; moved into the run loop while running.
    source: Option<Box<dyn AudioSource>>,
    services: PipelineServices,
    status: SharedStatus,
    stop_flag: Arc<AtomicBool>,
    test_mode: Arc<AtomicBool>,
    task: Option<JoinHandle<Box<dyn AudioSource>>>,
    holds_resource: bool,
}

impl RecognitionPipeline {
    pub fn new(
        config: PipelineConfig,
        source: Box<dyn AudioSource>,
        services: PipelineServices,
    ) -> Self {
        let test_mode = Arc::new(AtomicBool::new(config.test_mode));
        Self {
            config,
            source: Some(source),
            services,
            status: new_shared_status(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            test_mode,
            task: None,
            holds_resource: false,
        }
    }

    pub fn state(&self) -> PipelineState {
        read_status(&self.status).state
    }

    pub fn status(&self) -> PipelineStatus {
        read_status(&self.status)
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode.load(Ordering::SeqCst)
    }

    /// Toggle test mode; takes effect at the next detection.
    pub fn set_test_mode(&self, enabled: bool) {
        self.test_mode.store(enabled, Ordering::SeqCst);
        log::info!("pipeline: test mode {}", if enabled { "on" } else { "off" });
    }

    fn set_state(&self, state: PipelineState) {
        update_status(&self.status, |s| s.state = state);
    }

    /// Open the microphone and begin listening.
    ///
    /// Returns `Ok(false)` (and stays `Idle`) when the configuration or the
    /// voice model is unusable, or when the pipeline is not idle. Device
    /// failures are errors; the pipeline stays `Idle` and holds nothing.
    pub fn start(&mut self) -> Result<bool, DeviceError> {
        let state = self.state();
        if state != PipelineState::Idle {
            log::warn!("pipeline: start ignored in state {}", state.label());
            return Ok(false);
        }

        let model = match self.config.validate() {
            Ok(model) => model,
            Err(e) => {
                log::warn!("pipeline: not starting: {e}");
                return Ok(false);
            }
        };

        if !self.services.broker.acquire(AUDIO_CAPTURE) {
            return Err(DeviceError::ResourceBusy(AUDIO_CAPTURE.into()));
        }
        self.holds_resource = true;

        let detector = match self.services.detectors.load(&model) {
            Ok(detector) => detector,
            Err(e) => {
                log::error!("pipeline: cannot load voice model: {e}");
                self.release_resource();
                return Ok(false);
            }
        };

        let Some(mut source) = self.source.take() else {
            self.release_resource();
            return Err(DeviceError::Thread("audio source already consumed".into()));
        };
        if let Err(e) = source.start(detector.format()) {
            log::error!("pipeline: audio device failed to start: {e}");
            self.source = Some(source);
            self.release_resource();
            return Err(e);
        }

        self.stop_flag.store(false, Ordering::SeqCst);
        self.set_state(PipelineState::Listening);

        let run_loop = RunLoop {
            recorder: CommandRecorder::new(self.config.recording, detector.format()),
            source,
            detector,
            recognizer: Arc::clone(&self.services.recognizer),
            events: Arc::clone(&self.services.events),
            status: Arc::clone(&self.status),
            stop: Arc::clone(&self.stop_flag),
            test_mode: Arc::clone(&self.test_mode),
            config: self.config.clone(),
            session: None,
            pending: Vec::new(),
        };
        self.task = Some(tokio::spawn(run_loop.run()));

        log::info!(
            "pipeline: started (model {}, test mode {})",
            model.path().display(),
            self.test_mode()
        );
        Ok(true)
    }

    /// Stop listening and release the microphone.
    ///
    /// Waits for the run loop to notice the stop flag. Calling it again, or
    /// on a pipeline that never started, only ensures the `Stopped` state.
    pub async fn stop(&mut self) {
        if self.state() == PipelineState::Stopped {
            return;
        }
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(mut source) => {
                    source.stop();
                    self.source = Some(source);
                }
                Err(e) => log::error!("pipeline: run loop failed: {e}"),
            }
        } else if let Some(source) = self.source.as_mut() {
            source.stop();
        }

        self.release_resource();
        self.set_state(PipelineState::Stopped);
        log::info!("pipeline: stopped");
    }

    fn release_resource(&mut self) {
        if self.holds_resource {
            self.services.broker.release(AUDIO_CAPTURE);
            self.holds_resource = false;
        }
    }
}

impl Drop for RecognitionPipeline {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);

        // The run loop owns the open source until its next frame boundary;
        // the microphone stays claimed until it has been handed back.
        if let (Some(task), true) = (self.task.take(), self.holds_resource) {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                self.holds_resource = false;
                let broker = Arc::clone(&self.services.broker);
                runtime.spawn(async move {
                    match task.await {
                        Ok(mut source) => source.stop(),
                        Err(e) => log::error!("pipeline: run loop failed: {e}"),
                    }
                    broker.release(AUDIO_CAPTURE);
                    log::debug!("pipeline: microphone released after drop");
                });
                return;
            }
        }
        self.release_resource();
    }
}

// ---------------------------------------------------------------------------
// RunLoop
// ---------------------------------------------------------------------------

struct RunLoop {
    source: Box<dyn AudioSource>,
    detector: Box<dyn HotwordDetector>,
    recorder: CommandRecorder,
    recognizer: Arc<dyn RecognitionClient>,
    events: Arc<dyn EventSink>,
    status: SharedStatus,
    stop: Arc<AtomicBool>,
    test_mode: Arc<AtomicBool>,
    config: PipelineConfig,
    session: Option<RecordingSession>,
    /// Samples read but not yet forming a full frame.
    pending: Vec<i16>,
}

impl RunLoop {
    async fn run(mut self) -> Box<dyn AudioSource> {
        log::debug!(
            "pipeline: run loop up ({} samples/frame)",
            self.detector.frame_len()
        );

        while !self.stopping() {
            let chunk = self.source.read();
            if chunk.is_empty() {
                if self.recording_complete() {
                    self.finish_command().await;
                } else {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                continue;
            }
            self.pending.extend_from_slice(chunk.samples());
            self.process_pending().await;
        }

        log::debug!("pipeline: run loop exiting");
        self.source
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: PipelineState) {
        update_status(&self.status, |s| s.state = state);
    }

    fn recording_complete(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| self.recorder.is_complete(s))
    }

    /// Slice `pending` into detector frames and handle each in turn.
    async fn process_pending(&mut self) {
        let frame_len = self.detector.frame_len().max(1);
        let format = self.detector.format();
        let mut offset = 0;

        while self.pending.len() - offset >= frame_len {
            if self.stopping() {
                break;
            }
            let frame = AudioFrame::new(self.pending[offset..offset + frame_len].to_vec(), format);
            offset += frame_len;

            if let Some(session) = self.session.as_mut() {
                self.recorder.feed(&frame, session);
                if self.recording_complete() {
                    self.finish_command().await;
                    return;
                }
            } else {
                self.on_detector_frame(&frame);
            }
        }
        self.pending.drain(..offset);
    }

    fn on_detector_frame(&mut self, frame: &AudioFrame) {
        match self.detector.classify(frame) {
            Detection::Silence => {}
            Detection::Hotword(index) => {
                update_status(&self.status, |s| s.hotwords += 1);
                if self.test_mode.load(Ordering::SeqCst) {
                    log::info!("pipeline: hotword {index} detected (test)");
                    self.events.emit(Event::HotwordDetected, EventTarget::Control);
                    return;
                }
                log::info!("pipeline: hotword {index} detected, recording command");
                self.events.emit(Event::HotwordDetected, EventTarget::All);
                self.session = Some(self.recorder.begin_recording());
                self.set_state(PipelineState::Recording);
            }
            Detection::Error(e) => log::warn!("pipeline: detector error: {e}"),
        }
    }

    /// Close the recording, transcribe it and report the outcome.
    async fn finish_command(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let reason = self.recorder.completion(&session);
        let clip = self.recorder.finish(session);
        log::debug!(
            "pipeline: recording complete ({reason:?}), {:.2}s kept",
            clip.duration().as_secs_f32()
        );

        self.events.emit(Event::HotwordReleased, EventTarget::All);
        self.set_state(PipelineState::Recognizing);

        match Self::recognize(self.recognizer.as_ref(), &self.config, &clip).await {
            Ok(command) => {
                log::info!("pipeline: command recognised: {command:?}");
                update_status(&self.status, |s| s.last_command = Some(command.clone()));
                self.events.emit(
                    Event::CommandDetected {
                        hotword: self.config.hotword_label.clone(),
                        command,
                    },
                    EventTarget::All,
                );
            }
            Err(reason) => {
                log::warn!("pipeline: command not recognised: {reason}");
                update_status(&self.status, |s| s.last_error = Some(reason.clone()));
                self.events
                    .emit(Event::CommandError { reason }, EventTarget::All);
            }
        }

        // Whatever was captured while waiting belongs to no command.
        let _ = self.source.read();
        self.pending.clear();
        self.set_state(PipelineState::Listening);
    }

    /// Takes its inputs by field so the future does not borrow the whole
    /// loop (the audio source is `Send` but not `Sync`).
    async fn recognize(
        recognizer: &dyn RecognitionClient,
        config: &PipelineConfig,
        clip: &AudioClip,
    ) -> Result<String, String> {
        if clip.is_empty() {
            return Err("no speech captured".into());
        }
        let Some(credentials) = config.credentials.as_ref() else {
            return Err("no speech provider configured".into());
        };

        let call = recognizer.recognize(clip, &config.language, credentials);
        let result = match tokio::time::timeout(config.recognition_timeout, call).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(Ok(_)) => Err(RecognitionError::Unintelligible),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RecognitionError::ProviderUnreachable(format!(
                "no answer within {:?}",
                config.recognition_timeout
            ))),
        };
        result.map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::audio::{MockAudioControl, MockAudioSource};
    use crate::events::RecordingEventSink;
    use crate::hotword::{MockDetectorFactory, MOCK_ERROR_SAMPLE, MOCK_HOTWORD_SAMPLE};
    use crate::recognition::{Credentials, MockRecognizer};
    use crate::resource::LocalResourceBroker;

    const FRAME: usize = 160;

    fn hotword() -> Vec<i16> {
        let mut v = vec![0; FRAME];
        v[3] = MOCK_HOTWORD_SAMPLE;
        v
    }

    fn speech(ms: usize) -> Vec<i16> {
        vec![12_000; 16 * ms]
    }

    fn quiet(ms: usize) -> Vec<i16> {
        vec![0; 16 * ms]
    }

    /// 200 ms of speech followed by enough silence to end the command.
    fn command() -> Vec<i16> {
        let mut v = speech(200);
        v.extend(quiet(100));
        v
    }

    struct Harness {
        pipeline: RecognitionPipeline,
        audio: Arc<MockAudioControl>,
        events: Arc<RecordingEventSink>,
        recognizer: Arc<MockRecognizer>,
        broker: Arc<LocalResourceBroker>,
        _dir: TempDir,
    }

    fn harness_with(
        source: MockAudioSource,
        recognizer: MockRecognizer,
        tweak: impl FnOnce(&mut PipelineConfig),
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("voice.pmdl");
        std::fs::write(&model, b"model").unwrap();

        let mut config = PipelineConfig {
            voice_model: Some(model),
            credentials: Some(Credentials::new(0, "key")),
            hotword_label: "jarvis".into(),
            ..PipelineConfig::default()
        };
        tweak(&mut config);

        let audio = source.control();
        let events = Arc::new(RecordingEventSink::default());
        let recognizer = Arc::new(recognizer);
        let broker = Arc::new(LocalResourceBroker::new());
        let services = PipelineServices {
            detectors: Arc::new(MockDetectorFactory::new(FRAME)),
            recognizer: recognizer.clone(),
            events: events.clone(),
            broker: broker.clone(),
        };

        Harness {
            pipeline: RecognitionPipeline::new(config, Box::new(source), services),
            audio,
            events,
            recognizer,
            broker,
            _dir: dir,
        }
    }

    fn harness(chunks: Vec<Vec<i16>>, recognizer: MockRecognizer) -> Harness {
        harness_with(MockAudioSource::new(chunks), recognizer, |_| {})
    }

    async fn wait_until(cond: impl Fn() -> bool) -> bool {
        for _ in 0..300 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    // ---- start refusal / failure ---------------------------------------

    #[tokio::test]
    async fn start_without_model_is_refused_and_stays_idle() {
        let mut h = harness_with(MockAudioSource::new(Vec::new()), MockRecognizer::ok("x"), |c| {
            c.voice_model = None
        });
        assert!(!h.pipeline.start().unwrap());
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
        assert_eq!(h.audio.starts(), 0);
        assert!(!h.broker.is_held(AUDIO_CAPTURE));
    }

    #[tokio::test]
    async fn device_failure_is_an_error_and_releases_resource() {
        let mut h = harness_with(MockAudioSource::failing(), MockRecognizer::ok("x"), |_| {});
        let err = h.pipeline.start().unwrap_err();
        assert!(matches!(err, DeviceError::NoDevice));
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
        assert!(!h.broker.is_held(AUDIO_CAPTURE));
    }

    #[tokio::test]
    async fn busy_microphone_is_an_error() {
        let mut h = harness(Vec::new(), MockRecognizer::ok("x"));
        assert!(h.broker.acquire(AUDIO_CAPTURE));
        assert!(matches!(
            h.pipeline.start().unwrap_err(),
            DeviceError::ResourceBusy(_)
        ));
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
    }

    // ---- happy path ----------------------------------------------------

    #[tokio::test]
    async fn hotword_then_command_emits_detected_command() {
        let mut h = harness(vec![hotword(), command()], MockRecognizer::ok("open the blinds"));
        assert!(h.pipeline.start().unwrap());
        assert!(h.broker.is_held(AUDIO_CAPTURE));

        let events = h.events.clone();
        assert!(wait_until(|| events.count("command.detected") == 1).await);

        assert_eq!(
            h.events.names(),
            vec!["hotword.detected", "hotword.released", "command.detected"]
        );
        let (last, target) = h.events.events().pop().unwrap();
        assert_eq!(
            last,
            Event::CommandDetected {
                hotword: "jarvis".into(),
                command: "open the blinds".into()
            }
        );
        assert_eq!(target, EventTarget::All);
        assert_eq!(h.recognizer.clips(), vec![3_200]);

        let status = h.pipeline.status();
        assert_eq!(status.last_command.as_deref(), Some("open the blinds"));
        assert!(wait_until(|| h.pipeline.state() == PipelineState::Listening).await);

        h.pipeline.stop().await;
    }

    #[tokio::test]
    async fn five_seconds_without_silence_is_sent_whole() {
        let mut h = harness(vec![hotword(), speech(5_500)], MockRecognizer::ok("long one"));
        assert!(h.pipeline.start().unwrap());

        let events = h.events.clone();
        assert!(wait_until(|| events.count("command.detected") == 1).await);
        assert_eq!(h.recognizer.clips(), vec![80_000]);
        assert_eq!(h.events.count("hotword.detected"), 1);

        h.pipeline.stop().await;
    }

    // ---- failures ------------------------------------------------------

    #[tokio::test]
    async fn unreachable_provider_reports_error_and_keeps_listening() {
        let mut h = harness(
            vec![hotword(), command(), quiet(10), hotword(), command()],
            MockRecognizer::err(RecognitionError::ProviderUnreachable("down".into())),
        );
        assert!(h.pipeline.start().unwrap());

        let events = h.events.clone();
        assert!(wait_until(|| events.count("command.error") == 2).await);
        assert_eq!(h.events.count("hotword.detected"), 2);
        assert_eq!(h.events.count("command.detected"), 0);
        assert!(h.pipeline.status().last_error.unwrap().contains("down"));
        assert!(wait_until(|| h.pipeline.state() == PipelineState::Listening).await);

        h.pipeline.stop().await;
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let mut h = harness_with(
            MockAudioSource::new(vec![hotword(), command()]),
            MockRecognizer::ok("late").with_delay(Duration::from_millis(500)),
            |c| c.recognition_timeout = Duration::from_millis(50),
        );
        assert!(h.pipeline.start().unwrap());

        let events = h.events.clone();
        assert!(wait_until(|| events.count("command.error") == 1).await);
        assert_eq!(h.events.count("command.detected"), 0);

        h.pipeline.stop().await;
    }

    #[tokio::test]
    async fn blank_transcript_is_an_error() {
        let mut h = harness(vec![hotword(), command()], MockRecognizer::ok("   "));
        assert!(h.pipeline.start().unwrap());
        let events = h.events.clone();
        assert!(wait_until(|| events.count("command.error") == 1).await);
        h.pipeline.stop().await;
    }

    #[tokio::test]
    async fn silent_command_skips_recognition() {
        let mut h = harness_with(
            MockAudioSource::new(vec![hotword(), quiet(300)]),
            MockRecognizer::ok("never"),
            |c| c.recording.max_duration = Duration::from_millis(200),
        );
        assert!(h.pipeline.start().unwrap());

        let events = h.events.clone();
        assert!(wait_until(|| events.count("command.error") == 1).await);
        assert!(h.recognizer.clips().is_empty());
        assert_eq!(h.events.count("hotword.released"), 1);

        h.pipeline.stop().await;
    }

    #[tokio::test]
    async fn detector_errors_do_not_stop_the_loop() {
        let mut broken = vec![0; FRAME];
        broken[0] = MOCK_ERROR_SAMPLE;
        let mut h = harness(vec![broken, hotword(), command()], MockRecognizer::ok("ok"));
        assert!(h.pipeline.start().unwrap());

        let events = h.events.clone();
        assert!(wait_until(|| events.count("command.detected") == 1).await);
        assert_eq!(h.events.count("hotword.detected"), 1);

        h.pipeline.stop().await;
    }

    #[tokio::test]
    async fn audio_captured_during_recognition_is_discarded() {
        let mut h = harness(
            vec![hotword(), command(), hotword()],
            MockRecognizer::ok("first").with_delay(Duration::from_millis(30)),
        );
        assert!(h.pipeline.start().unwrap());

        let events = h.events.clone();
        assert!(wait_until(|| events.count("command.detected") == 1).await);
        assert!(wait_until(|| h.pipeline.state() == PipelineState::Listening).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.events.count("hotword.detected"), 1);

        h.pipeline.stop().await;
    }

    // ---- test mode -----------------------------------------------------

    #[tokio::test]
    async fn test_mode_reports_to_control_only() {
        let mut h = harness_with(
            MockAudioSource::new(vec![hotword(), command()]),
            MockRecognizer::ok("ignored"),
            |c| {
                c.test_mode = true;
                c.credentials = None;
            },
        );
        assert!(h.pipeline.start().unwrap());

        let events = h.events.clone();
        assert!(wait_until(|| events.count("hotword.detected") == 1).await);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            h.events.events(),
            vec![(Event::HotwordDetected, EventTarget::Control)]
        );
        assert_eq!(h.pipeline.state(), PipelineState::Listening);
        assert!(h.recognizer.clips().is_empty());

        h.pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_mode_can_be_switched_off_while_running() {
        let mut h = harness_with(MockAudioSource::new(Vec::new()), MockRecognizer::ok("lights"), |c| {
            c.test_mode = true
        });
        assert!(h.pipeline.start().unwrap());
        assert!(h.pipeline.test_mode());

        h.pipeline.set_test_mode(false);
        h.audio.push(hotword());
        h.audio.push(command());

        let events = h.events.clone();
        assert!(wait_until(|| events.count("command.detected") == 1).await);
        assert_eq!(h.events.events()[0].1, EventTarget::All);

        h.pipeline.stop().await;
    }

    // ---- stop ----------------------------------------------------------

    #[tokio::test]
    async fn stop_is_idempotent_and_releases_once() {
        let mut h = harness(Vec::new(), MockRecognizer::ok("x"));
        assert!(h.pipeline.start().unwrap());
        assert_eq!(h.pipeline.state(), PipelineState::Listening);

        h.pipeline.stop().await;
        h.pipeline.stop().await;

        assert_eq!(h.pipeline.state(), PipelineState::Stopped);
        assert_eq!(h.audio.starts(), 1);
        assert_eq!(h.audio.stops(), 1);
        assert!(!h.broker.is_held(AUDIO_CAPTURE));
        assert!(h.broker.acquire(AUDIO_CAPTURE));
    }

    #[tokio::test]
    async fn stopped_is_terminal() {
        let mut h = harness(Vec::new(), MockRecognizer::ok("x"));
        h.pipeline.stop().await;
        assert_eq!(h.pipeline.state(), PipelineState::Stopped);
        assert!(!h.pipeline.start().unwrap());
        assert_eq!(h.audio.starts(), 0);
    }

    #[tokio::test]
    async fn dropping_keeps_microphone_claimed_until_loop_exits() {
        let mut h = harness_with(
            MockAudioSource::new(vec![hotword(), command()]),
            MockRecognizer::ok("late").with_delay(Duration::from_millis(300)),
            |c| c.recognition_timeout = Duration::from_secs(5),
        );
        assert!(h.pipeline.start().unwrap());
        assert!(wait_until(|| h.pipeline.state() == PipelineState::Recognizing).await);

        drop(h.pipeline);
        assert!(h.broker.is_held(AUDIO_CAPTURE));
        assert_eq!(h.audio.stops(), 0);

        let broker = h.broker.clone();
        assert!(wait_until(|| !broker.is_held(AUDIO_CAPTURE)).await);
        assert_eq!(h.audio.stops(), 1);
    }

    #[tokio::test]
    async fn stop_while_recording() {
        let mut h = harness(vec![hotword(), speech(100)], MockRecognizer::ok("x"));
        assert!(h.pipeline.start().unwrap());
        assert!(wait_until(|| h.pipeline.state() == PipelineState::Recording).await);

        h.pipeline.stop().await;
        assert_eq!(h.pipeline.state(), PipelineState::Stopped);
        assert!(h.recognizer.clips().is_empty());
        assert!(!h.broker.is_held(AUDIO_CAPTURE));
    }
}
