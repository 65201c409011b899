//! Pipeline state machine and the status snapshot shared with the service.
//!
//! [`SharedStatus`] is written by the run loop and read by whoever owns the
//! pipeline. Locks are held only for the duration of a field update and
//! never across an `.await`.

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of the recognition pipeline.
///
/// ```text
/// Idle ──start()──▶ Listening ──hotword──▶ Recording ──complete──▶ Recognizing
///                       ▲                                               │
///                       └──────────────── result / error ───────────────┘
/// any state ──stop()──▶ Stopped   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Constructed, device not opened.
    #[default]
    Idle,

    /// Feeding frames to the hotword detector.
    Listening,

    /// Capturing a command after a hotword.
    Recording,

    /// Waiting for the speech provider.
    Recognizing,

    /// Shut down; a new pipeline is needed to listen again.
    Stopped,
}

impl PipelineState {
    /// `true` while a command is being captured or transcribed.
    ///
    /// ```
    /// use voice_command::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Listening.is_busy());
    /// assert!(PipelineState::Recording.is_busy());
    /// assert!(PipelineState::Recognizing.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::Recording | PipelineState::Recognizing)
    }

    /// `true` while the run loop owns the microphone.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            PipelineState::Listening | PipelineState::Recording | PipelineState::Recognizing
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Listening => "Listening",
            PipelineState::Recording => "Recording",
            PipelineState::Recognizing => "Recognizing",
            PipelineState::Stopped => "Stopped",
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineStatus
// ---------------------------------------------------------------------------

/// What the pipeline has been doing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStatus {
    pub state: PipelineState,
    /// Hotword detections since start, test detections included.
    pub hotwords: u64,
    /// Most recent recognised command.
    pub last_command: Option<String>,
    /// Most recent recognition failure.
    pub last_error: Option<String>,
}

/// Thread-safe handle to [`PipelineStatus`].
pub type SharedStatus = Arc<Mutex<PipelineStatus>>;

pub fn new_shared_status() -> SharedStatus {
    Arc::new(Mutex::new(PipelineStatus::default()))
}

/// Apply `f` to the status, recovering from a poisoned lock.
pub(crate) fn update_status(status: &SharedStatus, f: impl FnOnce(&mut PipelineStatus)) {
    let mut guard = status.lock().unwrap_or_else(|p| p.into_inner());
    f(&mut guard);
}

/// Copy of the current status.
pub(crate) fn read_status(status: &SharedStatus) -> PipelineStatus {
    status.lock().unwrap_or_else(|p| p.into_inner()).clone()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
