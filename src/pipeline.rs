//! # Analysis Pipeline
//!
//! The full "score my recording" flow, run server-side:
//!
//! 1. **Prepare** the recording (canonical WAV when possible)
//! 2. **Assess** it with the pronunciation service
//! 3. **Coach**: send the raw assessment to the chat model
//!
//! Steps 2 and 3 run strictly in order because the coaching prompt is built
//! from the assessment response. Their failures are independent: a coaching
//! failure keeps the scores (with fallback text), an assessment failure
//! produces a placeholder report and skips coaching.

use crate::assessment::{AssessmentInput, PronunciationAssessor};
use crate::audio::{AudioError, AudioProcessor};
use crate::coaching::{analyze_with_fallback, CoachingClient};
use crate::report::{AnalysisReport, AudioSummary};
use std::sync::Arc;
use tracing::{info, warn};

/// One recording submitted for analysis.
#[derive(Debug, Clone)]
pub struct AnalyzeInput {
    pub audio: Vec<u8>,
    pub reference_text: Option<String>,
    pub language: String,
}

/// Report plus what happened along the way, for metrics.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub report: AnalysisReport,
    pub assessment_succeeded: bool,
    pub coaching_fallback: bool,
}

pub struct AnalysisPipeline {
    assessor: Arc<dyn PronunciationAssessor>,
    coaching: Arc<dyn CoachingClient>,
}

impl AnalysisPipeline {
    pub fn new(assessor: Arc<dyn PronunciationAssessor>, coaching: Arc<dyn CoachingClient>) -> Self {
        Self { assessor, coaching }
    }

    /// Run the pipeline.
    ///
    /// ## Errors:
    /// Only unusable input (an empty recording) is an error. Upstream
    /// failures are folded into the returned report.
    pub async fn run(&self, processor: &AudioProcessor, input: AnalyzeInput) -> Result<PipelineOutcome, AudioError> {
        let prepared = processor.prepare(input.audio)?;
        let audio_summary = AudioSummary {
            format: prepared.format.as_str().to_string(),
            converted: prepared.converted,
            sample_rate: prepared.sample_rate,
            duration_seconds: prepared.duration_seconds,
            note: prepared.note.clone(),
        };

        let assessment = self
            .assessor
            .assess(AssessmentInput {
                content_type: prepared.content_type(),
                audio: prepared.bytes,
                reference_text: input.reference_text,
                language: input.language,
            })
            .await;

        let result = match assessment {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Assessment failed, returning placeholder report");
                let mut report = AnalysisReport::placeholder(&e.to_string());
                report.audio = Some(audio_summary);
                return Ok(PipelineOutcome {
                    report,
                    assessment_succeeded: false,
                    coaching_fallback: false,
                });
            }
        };

        let mut report = AnalysisReport::from_assessment(&result);
        report.audio = Some(audio_summary);

        let coaching = analyze_with_fallback(self.coaching.as_ref(), &result.detailed_result).await;

        info!(
            report_id = %report.report_id,
            overall = report.scores.overall,
            coaching_model = %coaching.model,
            "Analysis completed"
        );

        report.ai_analysis = Some(coaching.analysis);
        report.ai_model = Some(coaching.model);

        Ok(PipelineOutcome {
            report,
            assessment_succeeded: true,
            coaching_fallback: coaching.fallback,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::assessment::model::{PronunciationScores, WordAssessment};
    use crate::assessment::{AssessmentError, AssessmentInput, AssessmentResult, PronunciationAssessor};
    use futures_util::future::BoxFuture;
    use std::sync::Mutex;

    /// Assessor with a canned answer that remembers what it was sent.
    pub struct FakeAssessor {
        pub answer: Result<AssessmentResult, AssessmentError>,
        pub seen: Mutex<Vec<AssessmentInput>>,
    }

    impl FakeAssessor {
        pub fn succeeding() -> Self {
            Self::with_answer(Ok(sample_result()))
        }

        pub fn with_answer(answer: Result<AssessmentResult, AssessmentError>) -> Self {
            Self { answer, seen: Mutex::new(Vec::new()) }
        }
    }

    impl PronunciationAssessor for FakeAssessor {
        fn assess(&self, input: AssessmentInput) -> BoxFuture<'_, Result<AssessmentResult, AssessmentError>> {
            self.seen.lock().unwrap().push(input);
            let answer = self.answer.clone();
            Box::pin(async move { answer })
        }

        fn is_configured(&self) -> bool {
            !matches!(self.answer, Err(AssessmentError::NotConfigured(_)))
        }
    }

    pub fn sample_result() -> AssessmentResult {
        AssessmentResult {
            recognized_text: "Thank you.".to_string(),
            scores: PronunciationScores {
                accuracy_score: 78.4,
                fluency_score: 91.0,
                completeness_score: 100.0,
                pronunciation_score: 84.6,
                prosody_score: 70.0,
            },
            words: vec![
                WordAssessment {
                    word: "thank".to_string(),
                    accuracy_score: Some(62.0),
                    error_type: Some("Mispronunciation".to_string()),
                    phonemes: vec![],
                },
                WordAssessment {
                    word: "you".to_string(),
                    accuracy_score: Some(95.0),
                    error_type: Some("None".to_string()),
                    phonemes: vec![],
                },
            ],
            detailed_result: serde_json::json!({ "RecognitionStatus": "Success", "DisplayText": "Thank you." }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeAssessor;
    use super::*;
    use crate::assessment::AssessmentError;
    use crate::audio::{encode_wav, DecodedAudioBuffer};
    use crate::coaching::prompt::FALLBACK_ANALYSIS;
    use crate::coaching::testing::FakeCoach;
    use crate::coaching::CoachingError;
    use crate::config::AudioSettings;

    fn input() -> AnalyzeInput {
        AnalyzeInput {
            audio: encode_wav(&DecodedAudioBuffer::mono(48000, vec![0.2; 480])),
            reference_text: None,
            language: "en-US".to_string(),
        }
    }

    fn processor() -> AudioProcessor {
        AudioProcessor::new(AudioSettings::default())
    }

    #[actix_web::test]
    async fn test_full_run_attaches_coaching() {
        let assessor = Arc::new(FakeAssessor::succeeding());
        let coach = Arc::new(FakeCoach { answer: Ok("注意 th 的发音！".to_string()) });
        let pipeline = AnalysisPipeline::new(assessor.clone(), coach);

        let outcome = pipeline.run(&processor(), input()).await.unwrap();
        assert!(outcome.assessment_succeeded);
        assert!(!outcome.coaching_fallback);
        assert_eq!(outcome.report.scores.overall, 85);
        assert_eq!(outcome.report.ai_analysis.as_deref(), Some("注意 th 的发音！"));
        assert_eq!(outcome.report.ai_model.as_deref(), Some("fake-model"));

        // the recording was resampled to 16kHz before being sent
        let seen = assessor.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].content_type, "audio/wav; codecs=audio/pcm; samplerate=16000");
        assert_eq!(seen[0].audio.len(), 44 + 160 * 2);
        assert_eq!(outcome.report.audio.as_ref().unwrap().sample_rate, Some(16000));
    }

    #[actix_web::test]
    async fn test_coaching_failure_keeps_scores() {
        let pipeline = AnalysisPipeline::new(
            Arc::new(FakeAssessor::succeeding()),
            Arc::new(FakeCoach { answer: Err(CoachingError::Transport("reset".to_string())) }),
        );

        let outcome = pipeline.run(&processor(), input()).await.unwrap();
        assert!(outcome.assessment_succeeded);
        assert!(outcome.coaching_fallback);
        assert!(!outcome.report.is_placeholder());
        assert_eq!(outcome.report.detected_text, "Thank you.");
        assert_eq!(outcome.report.ai_analysis.as_deref(), Some(FALLBACK_ANALYSIS));
    }

    #[actix_web::test]
    async fn test_assessment_failure_skips_coaching() {
        let coach = Arc::new(FakeCoach { answer: Ok("unused".to_string()) });
        let pipeline = AnalysisPipeline::new(
            Arc::new(FakeAssessor::with_answer(Err(AssessmentError::Transport("timed out".to_string())))),
            coach,
        );

        let outcome = pipeline.run(&processor(), input()).await.unwrap();
        assert!(!outcome.assessment_succeeded);
        assert!(outcome.report.is_placeholder());
        assert_eq!(outcome.report.ai_analysis, None);
        assert!(outcome.report.error.unwrap().contains("timed out"));
    }

    #[actix_web::test]
    async fn test_empty_recording_is_rejected() {
        let pipeline = AnalysisPipeline::new(
            Arc::new(FakeAssessor::succeeding()),
            Arc::new(FakeCoach { answer: Ok(String::new()) }),
        );

        let mut empty = input();
        empty.audio.clear();
        assert_eq!(pipeline.run(&processor(), empty).await.unwrap_err(), AudioError::Empty);
    }
}
