//! Remote speech-to-text.
//!
//! [`RecognitionClient`] is the seam the pipeline awaits on; it is held as
//! `Arc<dyn RecognitionClient>`. [`AzureSpeechClient`] is the production
//! implementation, and [`PROVIDERS`] lists what the service can be pointed
//! at.

pub mod azure;
pub mod client;
pub mod providers;

pub use azure::AzureSpeechClient;
pub use client::{Credentials, RecognitionClient, RecognitionError};
pub use providers::{find_provider, validate_selection, Provider, PROVIDERS};

#[cfg(test)]
pub use client::MockRecognizer;
