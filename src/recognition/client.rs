//! The `RecognitionClient` trait, its error type and provider credentials.

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::AudioClip;

// ---------------------------------------------------------------------------
// RecognitionError
// ---------------------------------------------------------------------------

/// Typed outcome of a failed transcription. Every variant ends up as a
/// `command.error` event; none is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecognitionError {
    /// The provider heard nothing it could transcribe.
    #[error("speech was unintelligible")]
    Unintelligible,

    /// Transport failure, server error or timeout.
    #[error("speech provider unreachable: {0}")]
    ProviderUnreachable(String),

    /// The provider rejected the API key.
    #[error("speech provider rejected the credentials")]
    InvalidCredentials,
}

impl From<reqwest::Error> for RecognitionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RecognitionError::ProviderUnreachable("request timed out".into())
        } else {
            RecognitionError::ProviderUnreachable(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// API key for one provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    provider_id: u32,
    api_key: String,
}

impl Credentials {
    pub fn new(provider_id: u32, api_key: impl Into<String>) -> Self {
        Self {
            provider_id,
            api_key: api_key.into(),
        }
    }

    pub fn provider_id(&self) -> u32 {
        self.provider_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

// Keys end up in logs through `{:?}` on configs; never print them.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("provider_id", &self.provider_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RecognitionClient trait
// ---------------------------------------------------------------------------

/// Remote speech-to-text.
///
/// Called from the pipeline task, never from the capture callback. An empty
/// transcript is returned as `Ok("")`; the pipeline treats it like
/// `Unintelligible`.
#[async_trait]
pub trait RecognitionClient: Send + Sync {
    async fn recognize(
        &self,
        clip: &AudioClip,
        language: &str,
        credentials: &Credentials,
    ) -> Result<String, RecognitionError>;
}

// ---------------------------------------------------------------------------
// MockRecognizer  (test-only)
// ---------------------------------------------------------------------------

/// Returns a pre-configured response after an optional delay and records
/// the length of every clip it was given.
#[cfg(test)]
pub struct MockRecognizer {
    response: Result<String, RecognitionError>,
    delay: std::time::Duration,
    clips: std::sync::Mutex<Vec<usize>>,
}

#[cfg(test)]
impl MockRecognizer {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            delay: std::time::Duration::ZERO,
            clips: Default::default(),
        }
    }

    pub fn err(error: RecognitionError) -> Self {
        Self {
            response: Err(error),
            delay: std::time::Duration::ZERO,
            clips: Default::default(),
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sample counts of the clips received so far.
    pub fn clips(&self) -> Vec<usize> {
        self.clips.lock().expect("mock clip log poisoned").clone()
    }
}

#[cfg(test)]
#[async_trait]
impl RecognitionClient for MockRecognizer {
    async fn recognize(
        &self,
        clip: &AudioClip,
        _language: &str,
        _credentials: &Credentials,
    ) -> Result<String, RecognitionError> {
        self.clips
            .lock()
            .expect("mock clip log poisoned")
            .push(clip.samples().len());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;

    #[test]
    fn debug_hides_api_key() {
        let creds = Credentials::new(0, "super-secret");
        let printed = format!("{creds:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("provider_id: 0"));
    }

    #[tokio::test]
    async fn mock_returns_configured_text_and_logs_clip() {
        let mock = MockRecognizer::ok("turn on the light");
        let clip = AudioClip::new(vec![1; 320], AudioFormat::default());
        let text = mock
            .recognize(&clip, "en-US", &Credentials::new(0, "k"))
            .await
            .unwrap();
        assert_eq!(text, "turn on the light");
        assert_eq!(mock.clips(), vec![320]);
    }

    #[tokio::test]
    async fn recognizer_is_object_safe() {
        let client: std::sync::Arc<dyn RecognitionClient> =
            std::sync::Arc::new(MockRecognizer::err(RecognitionError::Unintelligible));
        let clip = AudioClip::new(vec![1; 10], AudioFormat::default());
        let err = client
            .recognize(&clip, "en-US", &Credentials::new(0, "k"))
            .await
            .unwrap_err();
        assert_eq!(err, RecognitionError::Unintelligible);
    }

    #[test]
    fn error_display() {
        let e = RecognitionError::ProviderUnreachable("503".into());
        assert!(e.to_string().contains("503"));
    }
}
