//! Hotword recognition pipeline.
//!
//! ```text
//! AudioSource::read()
//!        │
//!        ▼
//! RunLoop  ← tokio task spawned by RecognitionPipeline::start()
//!        │
//!        ├─ Listening    HotwordDetector::classify   → hotword.detected
//!        ├─ Recording    CommandRecorder::feed       → hotword.released
//!        └─ Recognizing  RecognitionClient::recognize → command.detected / command.error
//!
//! SharedStatus (Arc<Mutex<PipelineStatus>>) ←── read by SpeechService
//! ```
//!
//! A pipeline runs once: after [`RecognitionPipeline::stop`] it is
//! `Stopped` for good, and the service builds a fresh one to listen again.

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{PipelineServices, RecognitionPipeline};
pub use state::{new_shared_status, PipelineState, PipelineStatus, SharedStatus};
