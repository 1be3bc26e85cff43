//! # Azure Speech Client
//!
//! Calls the short-audio speech-to-text REST endpoint with pronunciation
//! assessment switched on through the `Pronunciation-Assessment` header.
//!
//! ## Request Shape:
//! ```text
//! POST https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1
//!      ?language=en-US&format=detailed
//! Ocp-Apim-Subscription-Key: <key>
//! Content-Type: audio/wav; codecs=audio/pcm; samplerate=16000
//! Pronunciation-Assessment: base64({"ReferenceText": "...", "GradingSystem": "HundredMark", ...})
//! <audio bytes>
//! ```

use super::{AssessmentError, AssessmentInput, AssessmentResult, PronunciationAssessor};
use crate::config::AzureSpeechConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::future::BoxFuture;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const ASSESSMENT_HEADER: &str = "Pronunciation-Assessment";

/// Parameters encoded into the `Pronunciation-Assessment` header.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssessmentParams<'a> {
    reference_text: &'a str,
    grading_system: &'static str,
    granularity: &'static str,
    dimension: &'static str,
    enable_miscue: bool,
    enable_prosody_assessment: bool,
}

/// Pronunciation assessor backed by Azure Speech.
pub struct AzureSpeechClient {
    http: reqwest::Client,
    config: AzureSpeechConfig,
}

impl AzureSpeechClient {
    /// Build a client. Missing credentials are not an error here; every
    /// `assess` call reports `NotConfigured` instead.
    pub fn new(config: AzureSpeechConfig) -> Result<Self, AssessmentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AssessmentError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Recognition URL for the given locale.
    fn endpoint(&self, language: &str) -> Result<Url, AssessmentError> {
        let base = match (&self.config.endpoint, &self.config.region) {
            (Some(endpoint), _) if !endpoint.trim().is_empty() => endpoint.trim().to_string(),
            (_, Some(region)) if !region.trim().is_empty() => format!(
                "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
                region.trim()
            ),
            _ => return Err(AssessmentError::NotConfigured("AZURE_SPEECH_REGION".to_string())),
        };

        let mut url = Url::parse(&base)
            .map_err(|e| AssessmentError::NotConfigured(format!("a valid endpoint URL ({})", e)))?;
        url.query_pairs_mut()
            .append_pair("language", language)
            .append_pair("format", "detailed");

        Ok(url)
    }

    fn subscription_key(&self) -> Result<&str, AssessmentError> {
        self.config
            .key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AssessmentError::NotConfigured("AZURE_SPEECH_KEY".to_string()))
    }

    /// Base64 JSON value of the `Pronunciation-Assessment` header.
    ///
    /// An empty reference text asks for unscripted assessment: the service
    /// scores whatever it recognized.
    pub fn assessment_header(reference_text: Option<&str>, enable_prosody: bool) -> String {
        let params = AssessmentParams {
            reference_text: reference_text.unwrap_or(""),
            grading_system: "HundredMark",
            granularity: "Phoneme",
            dimension: "Comprehensive",
            enable_miscue: false,
            enable_prosody_assessment: enable_prosody,
        };

        // Serializing a struct of strings and bools cannot fail
        let json = serde_json::to_vec(&params).unwrap_or_default();
        STANDARD.encode(json)
    }

    async fn send(&self, input: AssessmentInput) -> Result<AssessmentResult, AssessmentError> {
        let key = self.subscription_key()?;
        let url = self.endpoint(&input.language)?;

        if input.audio.is_empty() {
            return Err(AssessmentError::InvalidAudio("recording is empty".to_string()));
        }

        let started = Instant::now();
        let audio_bytes = input.audio.len();

        let response = self
            .http
            .post(url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .header(CONTENT_TYPE, input.content_type.as_str())
            .header(ACCEPT, "application/json")
            .header(
                ASSESSMENT_HEADER,
                Self::assessment_header(input.reference_text.as_deref(), self.config.enable_prosody),
            )
            .body(input.audio)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Azure Speech rejected assessment request");

            return Err(match status.as_u16() {
                400 | 415 => AssessmentError::InvalidAudio(body),
                code => AssessmentError::Http { status: code, body },
            });
        }

        let body: serde_json::Value = response.json().await?;
        let result = AssessmentResult::from_response(body)?;

        info!(
            audio_bytes,
            language = %input.language,
            pronunciation_score = result.scores.pronunciation_score,
            duration_ms = started.elapsed().as_millis() as u64,
            "Pronunciation assessment completed"
        );

        Ok(result)
    }
}

impl PronunciationAssessor for AzureSpeechClient {
    fn assess(&self, input: AssessmentInput) -> BoxFuture<'_, Result<AssessmentResult, AssessmentError>> {
        Box::pin(self.send(input))
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
    use serde_json::json;

    fn config(endpoint: Option<String>) -> AzureSpeechConfig {
        AzureSpeechConfig {
            key: Some("test-key".to_string()),
            region: Some("eastus".to_string()),
            language: "en-US".to_string(),
            endpoint,
            timeout_secs: 5,
            enable_prosody: true,
        }
    }

    fn input() -> AssessmentInput {
        AssessmentInput {
            audio: vec![1, 2, 3, 4],
            content_type: "audio/wav; codecs=audio/pcm; samplerate=16000".to_string(),
            reference_text: Some("good morning".to_string()),
            language: "en-US".to_string(),
        }
    }

    /// Stand-in for the recognition endpoint. Answers 401 unless the request
    /// carries the expected key and assessment parameters.
    async fn fake_recognition(req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        let params: serde_json::Value = STANDARD
            .decode(header(ASSESSMENT_HEADER))
            .ok()
            .and_then(|raw| serde_json::from_slice(&raw).ok())
            .unwrap_or_default();

        let authorized = header(SUBSCRIPTION_KEY_HEADER) == "test-key"
            && header("content-type").starts_with("audio/wav")
            && req.query_string().contains("format=detailed")
            && params["ReferenceText"] == "good morning"
            && params["Granularity"] == "Phoneme"
            && &body[..] == &[1u8, 2, 3, 4][..];

        if !authorized {
            return HttpResponse::Unauthorized().body("bad request shape");
        }

        HttpResponse::Ok().json(json!({
            "RecognitionStatus": "Success",
            "DisplayText": "Good morning.",
            "NBest": [{
                "PronunciationAssessment": {
                    "AccuracyScore": 90.0, "FluencyScore": 80.0,
                    "CompletenessScore": 100.0, "PronScore": 88.0
                },
                "Words": []
            }]
        }))
    }

    async fn silent_recognition() -> HttpResponse {
        HttpResponse::Ok().json(json!({ "RecognitionStatus": "InitialSilenceTimeout" }))
    }

    fn spawn_stub() -> String {
        let server = HttpServer::new(|| {
            App::new()
                .route("/recognize", web::post().to(fake_recognition))
                .route("/silent", web::post().to(silent_recognition))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }

    #[test]
    fn test_assessment_header_encoding() {
        let header = AzureSpeechClient::assessment_header(None, false);
        let decoded: serde_json::Value = serde_json::from_slice(&STANDARD.decode(header).unwrap()).unwrap();

        assert_eq!(decoded["ReferenceText"], "");
        assert_eq!(decoded["GradingSystem"], "HundredMark");
        assert_eq!(decoded["Dimension"], "Comprehensive");
        assert_eq!(decoded["EnableMiscue"], false);
        assert_eq!(decoded["EnableProsodyAssessment"], false);
    }

    #[test]
    fn test_endpoint_from_region() {
        let client = AzureSpeechClient::new(config(None)).unwrap();
        let url = client.endpoint("en-GB").unwrap();

        assert_eq!(url.host_str(), Some("eastus.stt.speech.microsoft.com"));
        assert_eq!(url.query(), Some("language=en-GB&format=detailed"));
    }

    #[actix_web::test]
    async fn test_unconfigured_client_fails_fast() {
        let mut cfg = config(None);
        cfg.key = None;
        let client = AzureSpeechClient::new(cfg).unwrap();

        assert!(!client.is_configured());
        assert_eq!(
            client.assess(input()).await,
            Err(AssessmentError::NotConfigured("AZURE_SPEECH_KEY".to_string()))
        );
    }

    #[actix_web::test]
    async fn test_assess_against_stub_service() {
        let base = spawn_stub();
        let client = AzureSpeechClient::new(config(Some(format!("{}/recognize", base)))).unwrap();

        let result = client.assess(input()).await.unwrap();
        assert_eq!(result.recognized_text, "Good morning.");
        assert_eq!(result.scores.pronunciation_score, 88.0);
        assert!(result.words.is_empty());
    }

    #[actix_web::test]
    async fn test_rejected_request_maps_to_http_error() {
        let base = spawn_stub();
        let client = AzureSpeechClient::new(config(Some(format!("{}/recognize", base)))).unwrap();

        let mut wrong = input();
        wrong.reference_text = Some("something else".to_string());

        match client.assess(wrong).await {
            Err(AssessmentError::Http { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad request shape");
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_silence_is_not_recognized() {
        let base = spawn_stub();
        let client = AzureSpeechClient::new(config(Some(format!("{}/silent", base)))).unwrap();

        assert_eq!(
            client.assess(input()).await,
            Err(AssessmentError::NotRecognized("InitialSilenceTimeout".to_string()))
        );
    }
}
