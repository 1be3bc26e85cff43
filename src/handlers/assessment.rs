use super::{decode_audio_data, read_json_body};
use crate::assessment::{AssessmentInput, AssessmentResult};
use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Body of `POST /api/pronunciation-assessment`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRequest {
    /// Base64 recording (or a base64 data URL)
    pub audio_data: Option<String>,
    pub reference_text: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssessmentResponse {
    success: bool,
    #[serde(flatten)]
    result: AssessmentResult,
}

/// Score one recording.
///
/// ## Endpoint: `POST /api/pronunciation-assessment`
///
/// ## Response:
/// ```json
/// {
///   "success": true,
///   "recognizedText": "Good morning.",
///   "pronunciationAssessment": {
///     "accuracyScore": 92.0, "fluencyScore": 85.0, "completenessScore": 100.0,
///     "pronunciationScore": 89.4, "prosodyScore": 0.0
///   },
///   "words": [{ "word": "good", "accuracyScore": 95.0, "errorType": "None", "phonemes": [] }],
///   "detailedResult": { "RecognitionStatus": "Success", "NBest": [] }
/// }
/// ```
pub async fn pronunciation_assessment(
    state: web::Data<AppState>,
    payload: web::Payload,
) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let request: AssessmentRequest = read_json_body(payload, config.audio.max_upload_bytes).await?;

    let audio = decode_audio_data(request.audio_data.as_deref(), config.audio.max_upload_bytes)?;
    let prepared = state.audio_processor().prepare(audio)?;

    let language = request
        .language
        .filter(|lang| !lang.trim().is_empty())
        .unwrap_or(config.azure.language);
    let reference_text = request.reference_text.filter(|text| !text.trim().is_empty());

    info!(
        bytes = prepared.bytes.len(),
        format = prepared.format.as_str(),
        converted = prepared.converted,
        language = %language,
        scripted = reference_text.is_some(),
        "Assessing recording"
    );

    let outcome = state
        .assessor()
        .assess(AssessmentInput {
            content_type: prepared.content_type(),
            audio: prepared.bytes,
            reference_text,
            language,
        })
        .await;
    state.record_assessment(outcome.is_ok());

    Ok(HttpResponse::Ok().json(AssessmentResponse {
        success: true,
        result: outcome?,
    }))
}
