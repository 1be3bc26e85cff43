//! DeepSeek chat-completion client.
//!
//! DeepSeek speaks the OpenAI chat API: `POST {api_url}/chat/completions`
//! with a bearer token, answer text in `choices[0].message.content`.

use super::prompt::{user_message, SYSTEM_PROMPT};
use super::{CoachingClient, CoachingError};
use crate::config::CoachConfig;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct DeepSeekClient {
    http: reqwest::Client,
    config: CoachConfig,
}

impl DeepSeekClient {
    pub fn new(config: CoachConfig) -> Result<Self, CoachingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { http, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'))
    }

    fn system_prompt(&self) -> &str {
        self.config.system_prompt.as_deref().unwrap_or(SYSTEM_PROMPT)
    }

    async fn complete(&self, context: &serde_json::Value) -> Result<String, CoachingError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(CoachingError::NotConfigured)?;

        let user = user_message(context);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: self.system_prompt() },
                ChatMessage { role: "user", content: &user },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "DeepSeek rejected coaching request");
            return Err(CoachingError::Http { status: status.as_u16(), body });
        }

        let reply: ChatResponse = response.json().await?;
        let analysis = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CoachingError::EmptyResponse)?;

        info!(
            model = %self.config.model,
            chars = analysis.chars().count(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Coaching analysis generated"
        );

        Ok(analysis)
    }
}

impl CoachingClient for DeepSeekClient {
    fn coach<'a>(&'a self, context: &'a serde_json::Value) -> BoxFuture<'a, Result<String, CoachingError>> {
        Box::pin(self.complete(context))
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
    use serde_json::json;

    fn config(api_url: String) -> CoachConfig {
        CoachConfig {
            api_key: Some("sk-test".to_string()),
            api_url,
            ..AppConfig::default().coach
        }
    }

    async fn fake_completion(req: HttpRequest, body: web::Json<serde_json::Value>) -> HttpResponse {
        let auth = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let well_formed = auth == "Bearer sk-test"
            && body["model"] == "deepseek-chat"
            && body["max_tokens"] == 800
            && body["messages"][0]["role"] == "system"
            && body["messages"][1]["content"]
                .as_str()
                .map_or(false, |c| c.contains("\"PronScore\": 72"));

        if !well_formed {
            return HttpResponse::BadRequest().body("unexpected request");
        }

        HttpResponse::Ok().json(json!({
            "id": "cmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "每天跟读五分钟！" } }]
        }))
    }

    async fn empty_completion() -> HttpResponse {
        HttpResponse::Ok().json(json!({ "choices": [] }))
    }

    fn spawn_stub() -> String {
        let server = HttpServer::new(|| {
            App::new()
                .route("/ok/chat/completions", web::post().to(fake_completion))
                .route("/empty/chat/completions", web::post().to(empty_completion))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }

    #[test]
    fn test_completions_url_handles_trailing_slash() {
        let client = DeepSeekClient::new(config("https://api.deepseek.com/".to_string())).unwrap();
        assert_eq!(client.completions_url(), "https://api.deepseek.com/chat/completions");
    }

    #[test]
    fn test_custom_system_prompt() {
        let mut cfg = config("https://api.deepseek.com".to_string());
        assert_eq!(DeepSeekClient::new(cfg.clone()).unwrap().system_prompt(), SYSTEM_PROMPT);

        cfg.system_prompt = Some("Answer in English.".to_string());
        assert_eq!(DeepSeekClient::new(cfg).unwrap().system_prompt(), "Answer in English.");
    }

    #[actix_web::test]
    async fn test_missing_key_is_not_configured() {
        let mut cfg = config("http://127.0.0.1:9".to_string());
        cfg.api_key = None;
        let client = DeepSeekClient::new(cfg).unwrap();

        assert!(!client.is_configured());
        assert_eq!(client.coach(&json!({})).await, Err(CoachingError::NotConfigured));
    }

    #[actix_web::test]
    async fn test_completion_against_stub() {
        let base = spawn_stub();
        let client = DeepSeekClient::new(config(format!("{}/ok", base))).unwrap();

        let analysis = client.coach(&json!({ "azureResponse": { "PronScore": 72 } })).await;
        assert_eq!(analysis, Ok("每天跟读五分钟！".to_string()));
    }

    #[actix_web::test]
    async fn test_empty_choices_is_an_error() {
        let base = spawn_stub();
        let client = DeepSeekClient::new(config(format!("{}/empty", base))).unwrap();

        assert_eq!(client.coach(&json!({})).await, Err(CoachingError::EmptyResponse));
    }
}
