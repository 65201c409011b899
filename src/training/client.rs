//! HTTP client for the remote voice model training service.
//!
//! ```text
//! POST <endpoint>
//! Content-Type: application/json
//!
//! { "name": <label>, "token": <token>,
//!   "microphone": "raspberry", "language": "ot",
//!   "universal_hotword": { "language": "ot" },
//!   "voice_samples": [ {"wave": <base64 wav>}, ×3 ] }
//! ```
//!
//! Any 2xx reply carries the model file as its body.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::Serialize;

use super::TrainingError;
use crate::config::{TrainingConfig, HOTWORD_SAMPLES};

// ---------------------------------------------------------------------------
// TrainingEndpoint trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TrainingEndpoint: Send + Sync {
    /// Submit three WAV files and return the trained model bytes.
    async fn train(
        &self,
        name: &str,
        token: &str,
        samples: [Vec<u8>; HOTWORD_SAMPLES],
    ) -> Result<Vec<u8>, TrainingError>;
}

// ---------------------------------------------------------------------------
// HttpTrainingClient
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TrainRequest<'a> {
    name: &'a str,
    token: &'a str,
    microphone: &'a str,
    language: &'a str,
    universal_hotword: UniversalHotword<'a>,
    voice_samples: Vec<VoiceSample>,
}

#[derive(Serialize)]
struct UniversalHotword<'a> {
    language: &'a str,
}

#[derive(Serialize)]
struct VoiceSample {
    wave: String,
}

pub struct HttpTrainingClient {
    client: reqwest::Client,
    endpoint: String,
    microphone: String,
    language: String,
}

impl HttpTrainingClient {
    pub fn new(config: &TrainingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: config.endpoint.clone(),
            microphone: config.microphone.clone(),
            language: config.language.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TrainingEndpoint for HttpTrainingClient {
    async fn train(
        &self,
        name: &str,
        token: &str,
        samples: [Vec<u8>; HOTWORD_SAMPLES],
    ) -> Result<Vec<u8>, TrainingError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let request = TrainRequest {
            name,
            token,
            microphone: &self.microphone,
            language: &self.language,
            universal_hotword: UniversalHotword {
                language: &self.language,
            },
            voice_samples: samples
                .iter()
                .map(|wav| VoiceSample {
                    wave: engine.encode(wav),
                })
                .collect(),
        };

        log::debug!("training: posting {HOTWORD_SAMPLES} samples to {}", self.endpoint);
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            log::debug!("training: service answered {status}: {message}");
            return Err(TrainingError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let model = response.bytes().await?;
        if model.is_empty() {
            return Err(TrainingError::EmptyModel);
        }
        Ok(model.to_vec())
    }
}

// ---------------------------------------------------------------------------
// MockTrainer  (test-only)
// ---------------------------------------------------------------------------

/// Answers every request with a fixed model or error and remembers the
/// `(name, token)` pairs it saw.
#[cfg(test)]
pub struct MockTrainer {
    response: Result<Vec<u8>, TrainingError>,
    delay: Duration,
    requests: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl MockTrainer {
    pub fn ok(model: &[u8]) -> Self {
        Self {
            response: Ok(model.to_vec()),
            delay: Duration::ZERO,
            requests: Default::default(),
        }
    }

    pub fn err(error: TrainingError) -> Self {
        Self {
            response: Err(error),
            delay: Duration::ZERO,
            requests: Default::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().expect("mock request log poisoned").clone()
    }
}

#[cfg(test)]
#[async_trait]
impl TrainingEndpoint for MockTrainer {
    async fn train(
        &self,
        name: &str,
        token: &str,
        _samples: [Vec<u8>; HOTWORD_SAMPLES],
    ) -> Result<Vec<u8>, TrainingError> {
        self.requests
            .lock()
            .expect("mock request log poisoned")
            .push((name.to_string(), token.to_string()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve_once, unreachable_url};

    fn client(url: &str) -> HttpTrainingClient {
        HttpTrainingClient::new(&TrainingConfig {
            endpoint: url.to_string(),
            timeout_secs: 5,
            ..TrainingConfig::default()
        })
    }

    fn samples() -> [Vec<u8>; HOTWORD_SAMPLES] {
        [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
    }

    #[tokio::test]
    async fn posts_json_and_returns_model_bytes() {
        let (url, server) =
            serve_once(201, "application/octet-stream", b"PMDL-BYTES".to_vec()).await;

        let model = client(&url).train("jarvis", "tok", samples()).await.unwrap();
        assert_eq!(model, b"PMDL-BYTES");

        let request = server.await.unwrap();
        assert!(request.request_line().starts_with("POST /"));
        let json: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(json["name"], "jarvis");
        assert_eq!(json["token"], "tok");
        assert_eq!(json["microphone"], "raspberry");
        assert_eq!(json["language"], "ot");
        assert_eq!(json["universal_hotword"]["language"], "ot");
        let waves = json["voice_samples"].as_array().unwrap();
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0]["wave"], "b25l");
        assert_eq!(waves[2]["wave"], "dGhyZWU=");
    }

    #[tokio::test]
    async fn rejection_carries_status() {
        let (url, _server) = serve_once(400, "text/plain", b"bad token".to_vec()).await;
        let err = client(&url).train("jarvis", "tok", samples()).await.unwrap_err();
        assert_eq!(
            err,
            TrainingError::Rejected {
                status: 400,
                message: "bad token".into()
            }
        );
    }

    #[tokio::test]
    async fn empty_body_is_an_error() {
        let (url, _server) = serve_once(200, "application/octet-stream", Vec::new()).await;
        let err = client(&url).train("jarvis", "tok", samples()).await.unwrap_err();
        assert_eq!(err, TrainingError::EmptyModel);
    }

    #[tokio::test]
    async fn unreachable_service() {
        let err = client(&unreachable_url())
            .train("jarvis", "tok", samples())
            .await
            .unwrap_err();
        assert!(matches!(err, TrainingError::Unreachable(_)));
    }
}
