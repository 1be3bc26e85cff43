use crate::coaching::{analyze_with_fallback, CoachingOutcome};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/ai-analysis`.
///
/// `azureResponse` is what the browser sends after an assessment; `context`
/// is accepted for other callers with their own data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingRequest {
    pub azure_response: Option<serde_json::Value>,
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct CoachingResponse {
    success: bool,
    #[serde(flatten)]
    outcome: CoachingOutcome,
}

/// Coaching text for an assessment response.
///
/// ## Endpoint: `POST /api/ai-analysis`
///
/// Answers 200 whenever the request carries data: a failed model call is
/// reported through `model: "fallback"` and `error`, with the fixed
/// encouragement text in `analysis`.
pub async fn ai_analysis(
    state: web::Data<AppState>,
    body: web::Json<CoachingRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let context = request
        .azure_response
        .filter(is_assessment_data)
        .or_else(|| request.context.filter(is_assessment_data))
        .ok_or_else(|| AppError::BadRequest("Azure response data is required".to_string()))?;

    let outcome = analyze_with_fallback(state.coaching().as_ref(), &context).await;
    state.record_coaching(outcome.fallback);

    Ok(HttpResponse::Ok().json(CoachingResponse { success: true, outcome }))
}

/// Only structured data can be coached on; `null`, booleans, numbers and
/// strings are treated as missing.
fn is_assessment_data(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => true,
        _ => false,
    }
}
