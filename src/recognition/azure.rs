//! Microsoft (Bing / Azure) speech-to-text REST client.
//!
//! Sends the clip as a WAV body to the short-audio recognition endpoint:
//!
//! ```text
//! POST <endpoint>?language=<lang>&format=simple
//! Ocp-Apim-Subscription-Key: <key>
//! Content-Type: audio/wav; codecs=audio/pcm; samplerate=<rate>
//! ```
//!
//! and maps the reply:
//!
//! | reply                                   | result                 |
//! |-----------------------------------------|------------------------|
//! | 200, `RecognitionStatus == "Success"`   | `Ok(DisplayText)`      |
//! | 200, any other status                   | `Unintelligible`       |
//! | 401 / 403                               | `InvalidCredentials`   |
//! | other status, connect error, timeout    | `ProviderUnreachable`  |

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Credentials, RecognitionClient, RecognitionError};
use crate::audio::{clip_to_wav, AudioClip};

pub const DEFAULT_ENDPOINT: &str =
    "https://westus.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SimpleResult {
    recognition_status: String,
    #[serde(default)]
    display_text: String,
}

pub struct AzureSpeechClient {
    client: reqwest::Client,
    endpoint: String,
}

impl AzureSpeechClient {
    /// `endpoint` of `None` uses [`DEFAULT_ENDPOINT`]. `timeout` bounds each
    /// request at the HTTP layer; the pipeline applies its own as well.
    pub fn new(endpoint: Option<&str>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RecognitionClient for AzureSpeechClient {
    async fn recognize(
        &self,
        clip: &AudioClip,
        language: &str,
        credentials: &Credentials,
    ) -> Result<String, RecognitionError> {
        let wav = clip_to_wav(clip)
            .map_err(|e| RecognitionError::ProviderUnreachable(format!("encoding audio: {e}")))?;

        log::debug!(
            "recognition: sending {:.2}s clip ({} bytes) to {}",
            clip.duration().as_secs_f32(),
            wav.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("language", language), ("format", "simple")])
            .header("Ocp-Apim-Subscription-Key", credentials.api_key())
            .header(
                reqwest::header::CONTENT_TYPE,
                format!(
                    "audio/wav; codecs=audio/pcm; samplerate={}",
                    clip.format().sample_rate
                ),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .body(wav)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(RecognitionError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(RecognitionError::ProviderUnreachable(format!(
                "provider returned {status}"
            )));
        }

        let result: SimpleResult = response.json().await.map_err(|e| {
            RecognitionError::ProviderUnreachable(format!("malformed response: {e}"))
        })?;

        if result.recognition_status != "Success" {
            log::debug!("recognition: provider status {}", result.recognition_status);
            return Err(RecognitionError::Unintelligible);
        }
        let text = result.display_text.trim();
        if text.is_empty() {
            return Err(RecognitionError::Unintelligible);
        }
        Ok(text.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;
    use crate::testing::{serve_once, unreachable_url};

    fn clip() -> AudioClip {
        AudioClip::new(vec![1_000; 1_600], AudioFormat::default())
    }

    fn creds() -> Credentials {
        Credentials::new(0, "abc123")
    }

    fn client(url: &str) -> AzureSpeechClient {
        AzureSpeechClient::new(Some(url), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn success_returns_display_text_and_sends_wav() {
        let body = br#"{"RecognitionStatus":"Success","DisplayText":"Turn on the kitchen light.","Offset":0,"Duration":1}"#;
        let (url, server) = serve_once(200, "application/json", body.to_vec()).await;

        let text = client(&url).recognize(&clip(), "fr-FR", &creds()).await.unwrap();
        assert_eq!(text, "Turn on the kitchen light.");

        let request = server.await.unwrap();
        assert!(request.request_line().starts_with("POST /?"));
        assert!(request.request_line().contains("language=fr-FR"));
        assert!(request.request_line().contains("format=simple"));
        assert_eq!(request.header("ocp-apim-subscription-key"), Some("abc123"));
        assert_eq!(&request.body[..4], b"RIFF");
        assert_eq!(request.body.len(), 44 + 1_600 * 2);
    }

    #[tokio::test]
    async fn no_match_is_unintelligible() {
        let body = br#"{"RecognitionStatus":"NoMatch","Offset":0,"Duration":0}"#;
        let (url, _server) = serve_once(200, "application/json", body.to_vec()).await;
        let err = client(&url).recognize(&clip(), "en-US", &creds()).await.unwrap_err();
        assert_eq!(err, RecognitionError::Unintelligible);
    }

    #[tokio::test]
    async fn blank_text_is_unintelligible() {
        let body = br#"{"RecognitionStatus":"Success","DisplayText":"  "}"#;
        let (url, _server) = serve_once(200, "application/json", body.to_vec()).await;
        let err = client(&url).recognize(&clip(), "en-US", &creds()).await.unwrap_err();
        assert_eq!(err, RecognitionError::Unintelligible);
    }

    #[tokio::test]
    async fn unauthorized_is_invalid_credentials() {
        let (url, _server) = serve_once(401, "text/plain", b"denied".to_vec()).await;
        let err = client(&url).recognize(&clip(), "en-US", &creds()).await.unwrap_err();
        assert_eq!(err, RecognitionError::InvalidCredentials);
    }

    #[tokio::test]
    async fn server_error_is_unreachable() {
        let (url, _server) = serve_once(503, "text/plain", b"busy".to_vec()).await;
        let err = client(&url).recognize(&clip(), "en-US", &creds()).await.unwrap_err();
        assert!(matches!(err, RecognitionError::ProviderUnreachable(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_unreachable() {
        let err = client(&unreachable_url())
            .recognize(&clip(), "en-US", &creds())
            .await
            .unwrap_err();
        assert!(matches!(err, RecognitionError::ProviderUnreachable(_)));
    }

    #[test]
    fn default_endpoint() {
        let c = AzureSpeechClient::new(None, Duration::from_secs(1));
        assert_eq!(c.endpoint(), DEFAULT_ENDPOINT);
    }
}
