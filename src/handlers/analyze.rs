use super::assessment::AssessmentRequest;
use super::{decode_audio_data, read_json_body};
use crate::error::AppResult;
use crate::middleware::RequestId;
use crate::pipeline::AnalyzeInput;
use crate::state::AppState;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use tracing::info;

/// Assessment plus coaching in one call.
///
/// ## Endpoint: `POST /api/v1/analyze`
///
/// Takes the same body as `/api/pronunciation-assessment` and returns an
/// `AnalysisReport`. Upstream failures do not fail the request: a failed
/// assessment returns the placeholder report with `error` set, a failed
/// coaching call returns the fallback text.
pub async fn analyze(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Payload,
) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let request: AssessmentRequest = read_json_body(payload, config.audio.max_upload_bytes).await?;

    let audio = decode_audio_data(request.audio_data.as_deref(), config.audio.max_upload_bytes)?;
    let input = AnalyzeInput {
        audio,
        reference_text: request.reference_text.filter(|text| !text.trim().is_empty()),
        language: request
            .language
            .filter(|lang| !lang.trim().is_empty())
            .unwrap_or(config.azure.language),
    };

    let outcome = state.pipeline().run(&state.audio_processor(), input).await?;

    state.record_assessment(outcome.assessment_succeeded);
    if outcome.assessment_succeeded {
        state.record_coaching(outcome.coaching_fallback);
    }

    let request_id = req.extensions().get::<RequestId>().map(|id| id.0.clone()).unwrap_or_default();
    info!(
        request_id = %request_id,
        report_id = %outcome.report.report_id,
        placeholder = outcome.report.is_placeholder(),
        "Analysis report ready"
    );

    Ok(HttpResponse::Ok().json(outcome.report))
}
