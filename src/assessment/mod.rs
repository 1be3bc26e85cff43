//! # Pronunciation Assessment
//!
//! Scoring is delegated to Azure Speech. This module defines the seam the
//! rest of the server talks to (`PronunciationAssessor`), the typed result we
//! extract from the vendor response, and the Azure REST client itself.
//!
//! ## Key Components:
//! - **PronunciationAssessor**: Trait so handlers and tests can swap implementations
//! - **AzureSpeechClient**: Short-audio REST recognition with the pronunciation header
//! - **AssessmentResult**: Scores, per-word and per-phoneme detail, raw response

pub mod azure;   // Azure Speech REST client
pub mod model;   // Result types and vendor response parsing

pub use azure::AzureSpeechClient;
pub use model::AssessmentResult;

use futures_util::future::BoxFuture;
use std::fmt;

/// One recording to score.
#[derive(Debug, Clone)]
pub struct AssessmentInput {
    /// Encoded recording (canonical WAV, or whatever the browser produced)
    pub audio: Vec<u8>,

    /// MIME type of `audio`
    pub content_type: String,

    /// Text the speaker was asked to read; `None` means unscripted speech
    pub reference_text: Option<String>,

    /// Recognition locale such as "en-US"
    pub language: String,
}

/// Something that can turn a recording into pronunciation scores.
///
/// ## Why a trait:
/// The HTTP handlers only need "give me scores for these bytes". Keeping the
/// vendor behind a trait object lets tests inject a fake and keeps
/// credentials inside the one type that needs them.
pub trait PronunciationAssessor: Send + Sync {
    fn assess(&self, input: AssessmentInput) -> BoxFuture<'_, Result<AssessmentResult, AssessmentError>>;

    /// Whether credentials are present. Unconfigured assessors fail every call.
    fn is_configured(&self) -> bool;
}

/// Failures of an assessment call.
#[derive(Debug, Clone, PartialEq)]
pub enum AssessmentError {
    /// Credentials or region are missing
    NotConfigured(String),

    /// The recording was empty or rejected by the service
    InvalidAudio(String),

    /// The service answered with a non-success HTTP status
    Http { status: u16, body: String },

    /// The request never completed (DNS, TLS, timeout, ...)
    Transport(String),

    /// Recognition finished without recognized speech (NoMatch, InitialSilenceTimeout, ...)
    NotRecognized(String),

    /// The response could not be understood
    Malformed(String),
}

impl fmt::Display for AssessmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssessmentError::NotConfigured(what) => {
                write!(f, "Azure Speech Service not configured: {} is missing", what)
            }
            AssessmentError::InvalidAudio(msg) => write!(f, "Audio rejected: {}", msg),
            AssessmentError::Http { status, body } => {
                write!(f, "Azure Speech returned HTTP {}: {}", status, body)
            }
            AssessmentError::Transport(msg) => write!(f, "Azure Speech request failed: {}", msg),
            AssessmentError::NotRecognized(status) => write!(f, "no speech recognized ({})", status),
            AssessmentError::Malformed(msg) => write!(f, "Unexpected Azure Speech response: {}", msg),
        }
    }
}

impl std::error::Error for AssessmentError {}

impl From<reqwest::Error> for AssessmentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AssessmentError::Malformed(err.to_string())
        } else {
            AssessmentError::Transport(err.to_string())
        }
    }
}
