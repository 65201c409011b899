//! Personal voice model training.
//!
//! Three recorded hotword samples are trimmed, encoded and posted to a
//! remote training service, which answers with a model file the hotword
//! detector can load. [`TrainingCoordinator`] runs one such job at a time.

pub mod client;
pub mod coordinator;

use std::path::PathBuf;

use thiserror::Error;

pub use client::{HttpTrainingClient, TrainingEndpoint};
pub use coordinator::TrainingCoordinator;

#[cfg(test)]
pub use client::MockTrainer;

// ---------------------------------------------------------------------------
// TrainingError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    #[error("a training job is already running")]
    InProgress,

    #[error("hotword recording missing: {}", .0.display())]
    MissingRecording(PathBuf),

    #[error("no training API token configured")]
    EmptyToken,

    #[error("hotword label is empty")]
    EmptyLabel,

    #[error("training service unreachable: {0}")]
    Unreachable(String),

    #[error("training service rejected the samples ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("training service returned an empty model")]
    EmptyModel,

    #[error("training I/O error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for TrainingError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unreachable(e.to_string())
    }
}

impl From<std::io::Error> for TrainingError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
