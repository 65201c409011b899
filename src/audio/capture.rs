//! Microphone capture via `cpal`.
//!
//! [`MicrophoneSource`] owns the default input device. The cpal callback
//! downmixes, resamples and quantises each hardware buffer to mono 16-bit
//! PCM at the requested rate, then appends it to a shared [`RingBuffer`].
//! The pipeline drains that buffer through [`AudioSource::read`], which never
//! blocks on the device.
//!
//! `cpal::Stream` is not `Send` on every platform, so the stream lives on a
//! dedicated `audio-capture` thread for its whole life. Starting waits for
//! that thread to report success; stopping signals it and joins.
//!
//! ```text
//! device → cpal callback → stereo_to_mono → resample → f32_to_i16
//!        → try_lock(RingBuffer) ─┬─ push_slice (overwrite oldest)
//!                                └─ contended: drop chunk, bump counter
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, TryLockError};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::resample::{f32_to_i16, resample, stereo_to_mono};
use super::{AudioFormat, AudioFrame, RingBuffer};

/// Default ring buffer length (five seconds of audio).
pub const DEFAULT_BUFFER_DURATION: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors raised while acquiring or starting the audio device.
///
/// Fatal to `start()`: the caller stays idle.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("resource {0:?} is held by another component")]
    ResourceBusy(String),

    #[error("capture thread failed: {0}")]
    Thread(String),
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// A continuous PCM producer the pipeline can poll.
pub trait AudioSource: Send {
    /// Open the device and begin filling the buffer with audio in `format`.
    fn start(&mut self, format: AudioFormat) -> Result<(), DeviceError>;

    /// Drain everything buffered since the last call. Empty when no data has
    /// arrived; never waits for the device.
    fn read(&mut self) -> AudioFrame;

    /// Release the device. Safe to call repeatedly.
    fn stop(&mut self);
}

// ---------------------------------------------------------------------------
// MicrophoneSource
// ---------------------------------------------------------------------------

struct CaptureWorker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Counters updated from the callback thread.
#[derive(Debug, Default)]
struct CaptureStats {
    /// Samples discarded because the reader held the buffer lock.
    dropped: AtomicU64,
    /// Samples lost to ring buffer overflow.
    overwritten: AtomicU64,
}

/// Default input device, converted to the detector's format.
pub struct MicrophoneSource {
    buffer_duration: Duration,
    buffer: Arc<Mutex<RingBuffer<i16>>>,
    stats: Arc<CaptureStats>,
    format: AudioFormat,
    worker: Option<CaptureWorker>,
}

impl Default for MicrophoneSource {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_DURATION)
    }
}

impl MicrophoneSource {
    /// `buffer_duration` bounds how much unread audio is retained.
    pub fn new(buffer_duration: Duration) -> Self {
        Self {
            buffer_duration,
            buffer: Arc::new(Mutex::new(RingBuffer::new(1))),
            stats: Arc::new(CaptureStats::default()),
            format: AudioFormat::default(),
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Samples dropped because the buffer was locked by the reader.
    pub fn dropped_samples(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    /// Samples overwritten because the reader fell behind.
    pub fn overwritten_samples(&self) -> u64 {
        self.stats.overwritten.load(Ordering::Relaxed)
    }
}

impl AudioSource for MicrophoneSource {
    fn start(&mut self, format: AudioFormat) -> Result<(), DeviceError> {
        if self.worker.is_some() {
            return Ok(());
        }
        if format.channels != 1 || format.bits_per_sample != 16 || format.sample_rate == 0 {
            return Err(DeviceError::UnsupportedFormat(format!(
                "{} Hz, {} channel(s), {} bit; expected mono 16-bit",
                format.sample_rate, format.channels, format.bits_per_sample
            )));
        }

        let capacity = format.samples_for(self.buffer_duration).max(1);
        self.buffer = Arc::new(Mutex::new(RingBuffer::new(capacity)));
        self.format = format;

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), DeviceError>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let buffer = Arc::clone(&self.buffer);
        let stats = Arc::clone(&self.stats);

        let handle = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let stream = match open_stream(format.sample_rate, buffer, stats) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Blocks until stop() signals or the source is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("capture: stream closed");
            })
            .map_err(|e| DeviceError::Thread(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!(
                    "capture: microphone started ({} Hz mono, buffer {} samples)",
                    format.sample_rate,
                    capacity
                );
                self.worker = Some(CaptureWorker { stop_tx, handle });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(DeviceError::Thread("capture thread exited during startup".into()))
            }
        }
    }

    fn read(&mut self) -> AudioFrame {
        let samples = match self.buffer.lock() {
            Ok(mut buf) => buf.drain(),
            Err(poisoned) => poisoned.into_inner().drain(),
        };
        AudioFrame::new(samples, self.format)
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            log::warn!("capture: audio thread panicked");
        }
        let dropped = self.dropped_samples();
        if dropped > 0 {
            log::warn!("capture: {dropped} samples dropped due to lock contention");
        }
        log::info!("capture: microphone stopped");
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build and start the cpal input stream. Runs on the capture thread.
fn open_stream(
    target_rate: u32,
    buffer: Arc<Mutex<RingBuffer<i16>>>,
    stats: Arc<CaptureStats>,
) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(DeviceError::NoDevice)?;
    let supported = device.default_input_config()?;

    let sample_format = supported.sample_format();
    let channels = supported.channels();
    let device_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    log::debug!(
        "capture: device {:?} delivers {device_rate} Hz x{channels} {sample_format:?}",
        device.name().unwrap_or_default()
    );

    let on_error = |err: cpal::StreamError| log::error!("cpal stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = stereo_to_mono(data, channels);
                let pcm = f32_to_i16(&resample(&mono, device_rate, target_rate));
                append(&buffer, &stats, &pcm);
            },
            on_error,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                let mono = stereo_to_mono(&floats, channels);
                let pcm = f32_to_i16(&resample(&mono, device_rate, target_rate));
                append(&buffer, &stats, &pcm);
            },
            on_error,
            None,
        )?,
        other => {
            return Err(DeviceError::UnsupportedFormat(format!(
                "device sample format {other:?}"
            )))
        }
    };

    stream.play()?;
    Ok(stream)
}

/// Callback-side append. Never blocks: a contended lock drops the chunk.
fn append(buffer: &Mutex<RingBuffer<i16>>, stats: &CaptureStats, pcm: &[i16]) {
    match buffer.try_lock() {
        Ok(mut buf) => {
            let lost = buf.push_slice(pcm);
            if lost > 0 {
                stats.overwritten.fetch_add(lost as u64, Ordering::Relaxed);
            }
        }
        Err(TryLockError::WouldBlock) | Err(TryLockError::Poisoned(_)) => {
            stats.dropped.fetch_add(pcm.len() as u64, Ordering::Relaxed);
        }
    }
}

// ---------------------------------------------------------------------------
// MockAudioSource (test only)
// ---------------------------------------------------------------------------

/// Shared view of a [`MockAudioSource`] that survives moving the source into
/// a pipeline.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockAudioControl {
    pub chunks: Mutex<std::collections::VecDeque<Vec<i16>>>,
    pub starts: std::sync::atomic::AtomicUsize,
    pub stops: std::sync::atomic::AtomicUsize,
    pub running: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockAudioControl {
    /// Queue a chunk to be returned by a later `read()`.
    pub fn push(&self, chunk: Vec<i16>) {
        self.chunks
            .lock()
            .expect("mock chunk queue poisoned")
            .push_back(chunk);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Scripted audio source: each `read()` pops the next queued chunk.
#[cfg(test)]
pub struct MockAudioSource {
    control: Arc<MockAudioControl>,
    format: AudioFormat,
    fail_start: bool,
}

#[cfg(test)]
impl MockAudioSource {
    pub fn new(chunks: Vec<Vec<i16>>) -> Self {
        let control = MockAudioControl::default();
        for c in chunks {
            control.push(c);
        }
        Self {
            control: Arc::new(control),
            format: AudioFormat::default(),
            fail_start: false,
        }
    }

    /// A source whose `start()` always reports a missing device.
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn control(&self) -> Arc<MockAudioControl> {
        Arc::clone(&self.control)
    }
}

#[cfg(test)]
impl AudioSource for MockAudioSource {
    fn start(&mut self, format: AudioFormat) -> Result<(), DeviceError> {
        if self.fail_start {
            return Err(DeviceError::NoDevice);
        }
        self.format = format;
        self.control.starts.fetch_add(1, Ordering::SeqCst);
        self.control.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self) -> AudioFrame {
        let next = self
            .control
            .chunks
            .lock()
            .expect("mock chunk queue poisoned")
            .pop_front();
        AudioFrame::new(next.unwrap_or_default(), self.format)
    }

    fn stop(&mut self) {
        if self.control.running.swap(false, Ordering::SeqCst) {
            self.control.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
