//! # Assessment Results
//!
//! Typed view of an Azure Speech "detailed" recognition response with
//! pronunciation assessment enabled.
//!
//! ## Response Shapes:
//! Older service versions put scores directly on the best candidate and on
//! each word (`AccuracyScore`, `ErrorType`, ...). Newer ones nest them under a
//! `PronunciationAssessment` object. Both are accepted; nested values win.

use super::AssessmentError;
use serde::{Deserialize, Serialize};

/// Overall scores on the 0-100 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PronunciationScores {
    pub accuracy_score: f64,
    pub fluency_score: f64,
    pub completeness_score: f64,
    pub pronunciation_score: f64,
    pub prosody_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonemeAssessment {
    pub phoneme: String,
    pub accuracy_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordAssessment {
    pub word: String,
    pub accuracy_score: Option<f64>,
    /// "None", "Omission", "Insertion", "Mispronunciation", ...
    pub error_type: Option<String>,
    pub phonemes: Vec<PhonemeAssessment>,
}

/// Everything the rest of the server needs from one assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub recognized_text: String,
    #[serde(rename = "pronunciationAssessment")]
    pub scores: PronunciationScores,
    pub words: Vec<WordAssessment>,
    /// Untouched vendor response, forwarded to the coaching model
    pub detailed_result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRecognition {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
    #[serde(default, rename = "NBest")]
    n_best: Vec<RawCandidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawScores {
    accuracy_score: Option<f64>,
    fluency_score: Option<f64>,
    completeness_score: Option<f64>,
    pron_score: Option<f64>,
    prosody_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCandidate {
    #[serde(default)]
    display: Option<String>,
    #[serde(flatten)]
    scores: RawScores,
    #[serde(default)]
    pronunciation_assessment: Option<RawScores>,
    #[serde(default)]
    words: Vec<RawWord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawWordScores {
    accuracy_score: Option<f64>,
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawWord {
    word: String,
    #[serde(flatten)]
    scores: RawWordScores,
    #[serde(default)]
    pronunciation_assessment: Option<RawWordScores>,
    #[serde(default)]
    phonemes: Vec<RawPhoneme>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPhoneme {
    phoneme: String,
    #[serde(flatten)]
    scores: RawWordScores,
    #[serde(default)]
    pronunciation_assessment: Option<RawWordScores>,
}

fn nested_or_flat<T: Clone>(nested: Option<&Option<T>>, flat: &Option<T>) -> Option<T> {
    nested.and_then(|n| n.clone()).or_else(|| flat.clone())
}

impl AssessmentResult {
    /// Build a result from the raw JSON body of a recognition call.
    ///
    /// ## Errors:
    /// - `NotRecognized` when `RecognitionStatus` is anything but "Success"
    /// - `Malformed` when the body is not a recognition response or has no candidates
    pub fn from_response(body: serde_json::Value) -> Result<Self, AssessmentError> {
        let raw: RawRecognition = serde_json::from_value(body.clone())
            .map_err(|e| AssessmentError::Malformed(e.to_string()))?;

        if raw.recognition_status != "Success" {
            return Err(AssessmentError::NotRecognized(raw.recognition_status));
        }

        let best = raw
            .n_best
            .into_iter()
            .next()
            .ok_or_else(|| AssessmentError::Malformed("response has no NBest candidates".to_string()))?;

        let nested = best.pronunciation_assessment.as_ref();
        let score = |pick: fn(&RawScores) -> &Option<f64>| {
            nested_or_flat(nested.map(pick), pick(&best.scores)).unwrap_or(0.0)
        };

        let scores = PronunciationScores {
            accuracy_score: score(|s| &s.accuracy_score),
            fluency_score: score(|s| &s.fluency_score),
            completeness_score: score(|s| &s.completeness_score),
            pronunciation_score: score(|s| &s.pron_score),
            prosody_score: score(|s| &s.prosody_score),
        };

        let words = best
            .words
            .iter()
            .map(|word| {
                let nested = word.pronunciation_assessment.as_ref();
                WordAssessment {
                    word: word.word.clone(),
                    accuracy_score: nested_or_flat(nested.map(|n| &n.accuracy_score), &word.scores.accuracy_score),
                    error_type: nested_or_flat(nested.map(|n| &n.error_type), &word.scores.error_type),
                    phonemes: word
                        .phonemes
                        .iter()
                        .map(|phoneme| PhonemeAssessment {
                            phoneme: phoneme.phoneme.clone(),
                            accuracy_score: nested_or_flat(
                                phoneme.pronunciation_assessment.as_ref().map(|n| &n.accuracy_score),
                                &phoneme.scores.accuracy_score,
                            ),
                        })
                        .collect(),
                }
            })
            .collect();

        let recognized_text = raw
            .display_text
            .or(best.display)
            .unwrap_or_default();

        Ok(AssessmentResult {
            recognized_text,
            scores,
            words,
            detailed_result: body,
        })
    }
}
