//! # Analysis Reports
//!
//! Shapes an assessment into what the practice page shows: rounded headline
//! scores, one feedback line per word, and the coaching paragraph.

use crate::assessment::AssessmentResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Headline scores, rounded to whole points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub overall: u32,
    pub accuracy: u32,
    pub fluency: u32,
    pub completeness: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordFeedback {
    pub word: String,
    pub score: u32,
    pub feedback: String,
    pub position: usize,
}

/// How the recording was prepared before assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSummary {
    pub format: String,
    pub converted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Why the recording was forwarded unconverted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub report_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub detected_text: String,
    pub scores: ScoreCard,
    pub word_feedback: Vec<WordFeedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_api_response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Round a 0-100 score to a whole number, treating garbage as 0.
fn round_score(score: f64) -> u32 {
    if score.is_finite() && score > 0.0 {
        score.round() as u32
    } else {
        0
    }
}

/// One-line feedback for a word.
///
/// An error type reported by the service takes precedence; otherwise the
/// accuracy score picks a band.
pub fn word_feedback_text(score: f64, error_type: Option<&str>) -> &'static str {
    match error_type {
        Some("Omission") => return "Word was not pronounced",
        Some("Insertion") => return "Extra word detected",
        Some("Mispronunciation") => return "Pronunciation needs improvement",
        _ => {}
    }

    if score >= 90.0 {
        "Excellent pronunciation"
    } else if score >= 80.0 {
        "Good pronunciation"
    } else if score >= 70.0 {
        "Acceptable, could be clearer"
    } else if score >= 60.0 {
        "Needs improvement"
    } else {
        "Significant improvement needed"
    }
}

impl AnalysisReport {
    pub fn from_assessment(result: &AssessmentResult) -> Self {
        let scores = ScoreCard {
            overall: round_score(result.scores.pronunciation_score),
            accuracy: round_score(result.scores.accuracy_score),
            fluency: round_score(result.scores.fluency_score),
            completeness: round_score(result.scores.completeness_score),
        };

        let word_feedback = result
            .words
            .iter()
            .enumerate()
            .map(|(position, word)| {
                let accuracy = word.accuracy_score.unwrap_or(0.0);
                WordFeedback {
                    word: word.word.clone(),
                    score: round_score(accuracy),
                    feedback: word_feedback_text(accuracy, word.error_type.as_deref()).to_string(),
                    position,
                }
            })
            .collect();

        Self {
            report_id: Uuid::new_v4(),
            created_at: Utc::now(),
            detected_text: result.recognized_text.clone(),
            scores,
            word_feedback,
            audio: None,
            raw_api_response: Some(result.detailed_result.clone()),
            ai_analysis: None,
            ai_model: None,
            error: None,
        }
    }

    /// Stand-in report shown when assessment failed.
    ///
    /// Carries fixed sample scores so the page still renders, plus the error
    /// text both in `error` and as word feedback.
    pub fn placeholder(error: &str) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            created_at: Utc::now(),
            detected_text: "Azure Error - Using mock data".to_string(),
            scores: ScoreCard {
                overall: 85,
                accuracy: 82,
                fluency: 88,
                completeness: 85,
            },
            word_feedback: vec![
                WordFeedback {
                    word: "Azure".to_string(),
                    score: 50,
                    feedback: "Check Azure Speech Service configuration".to_string(),
                    position: 0,
                },
                WordFeedback {
                    word: "Error:".to_string(),
                    score: 50,
                    feedback: error.to_string(),
                    position: 1,
                },
            ],
            audio: None,
            raw_api_response: None,
            ai_analysis: None,
            ai_model: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.error.is_some()
    }
}
