//! # Coaching Text
//!
//! Turns raw assessment data into a short improvement plan by asking a hosted
//! chat model (DeepSeek, OpenAI-compatible API).
//!
//! ## Soft Dependency:
//! Coaching text is optional garnish on top of the scores. `analyze_with_fallback`
//! never fails: any error yields the fixed `FALLBACK_ANALYSIS` text, so a
//! broken or unconfigured model can never hide an assessment result.

pub mod deepseek;  // OpenAI-compatible chat completion client
pub mod prompt;    // System prompt and fallback text

pub use deepseek::DeepSeekClient;

use futures_util::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// A chat model that writes coaching text from assessment data.
pub trait CoachingClient: Send + Sync {
    fn coach<'a>(&'a self, context: &'a serde_json::Value) -> BoxFuture<'a, Result<String, CoachingError>>;

    /// Model identifier reported alongside generated text.
    fn model(&self) -> &str;

    fn is_configured(&self) -> bool;
}

/// Failures of a coaching call.
#[derive(Debug, Clone, PartialEq)]
pub enum CoachingError {
    /// No API key configured
    NotConfigured,

    /// The API answered with a non-success HTTP status
    Http { status: u16, body: String },

    /// The request never completed
    Transport(String),

    /// The completion had no message content
    EmptyResponse,
}

impl fmt::Display for CoachingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoachingError::NotConfigured => write!(f, "DeepSeek API key not configured"),
            CoachingError::Http { status, body } => write!(f, "DeepSeek returned HTTP {}: {}", status, body),
            CoachingError::Transport(msg) => write!(f, "DeepSeek request failed: {}", msg),
            CoachingError::EmptyResponse => write!(f, "No analysis content received from DeepSeek"),
        }
    }
}

impl std::error::Error for CoachingError {}

impl From<reqwest::Error> for CoachingError {
    fn from(err: reqwest::Error) -> Self {
        CoachingError::Transport(err.to_string())
    }
}

/// Outcome of a coaching request: always carries text to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachingOutcome {
    pub analysis: String,
    pub model: String,
    /// True when `analysis` is the fixed fallback text
    #[serde(skip)]
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ask the model for coaching text, substituting the fallback on any failure.
pub async fn analyze_with_fallback(client: &dyn CoachingClient, context: &serde_json::Value) -> CoachingOutcome {
    match client.coach(context).await {
        Ok(analysis) => CoachingOutcome {
            analysis,
            model: client.model().to_string(),
            fallback: false,
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Coaching model unavailable, using fallback analysis");
            CoachingOutcome {
                analysis: prompt::FALLBACK_ANALYSIS.to_string(),
                model: prompt::FALLBACK_MODEL.to_string(),
                fallback: true,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Coaching client with a canned answer.
    pub struct FakeCoach {
        pub answer: Result<String, CoachingError>,
    }

    impl CoachingClient for FakeCoach {
        fn coach<'a>(&'a self, _context: &'a serde_json::Value) -> BoxFuture<'a, Result<String, CoachingError>> {
            let answer = self.answer.clone();
            Box::pin(async move { answer })
        }

        fn model(&self) -> &str {
            "fake-model"
        }

        fn is_configured(&self) -> bool {
            self.answer != Err(CoachingError::NotConfigured)
        }
    }
}
