//! # HTTP Handlers
//!
//! ## Available Endpoints:
//! - `POST /api/pronunciation-assessment` - Score a base64 recording
//! - `POST /api/ai-analysis` - Coaching text for an assessment response
//! - `POST /api/v1/analyze` - Both of the above in one call, as a report
//! - `POST /api/v1/audio/encode` - Sample arrays to a WAV file
//! - `POST /api/v1/audio/convert` - Uploaded recording to canonical WAV
//! - `GET|PUT /api/v1/config` - Redacted configuration view and updates
//! - `GET /health`, `GET /api/v1/health`, `GET /api/v1/metrics`

pub mod analyze;
pub mod assessment;
pub mod audio;
pub mod coaching;
pub mod config;

use crate::error::AppError;
use crate::health;
use actix_web::web;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::stream::StreamExt;
use serde::de::DeserializeOwned;

/// Register every route of the API.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/config", web::get().to(config::get_config))
            .route("/config", web::put().to(config::update_config))
            .route("/analyze", web::post().to(analyze::analyze))
            .route("/audio/encode", web::post().to(audio::encode_audio))
            .route("/audio/convert", web::post().to(audio::convert_audio)),
    )
    .route("/api/pronunciation-assessment", web::post().to(assessment::pronunciation_assessment))
    .route("/api/ai-analysis", web::post().to(coaching::ai_analysis))
    .route("/health", web::get().to(health::health_check));
}

/// Largest JSON body that may carry `max_upload_bytes` of base64 audio.
///
/// Base64 inflates audio by a third; the rest is headroom for other fields.
pub fn json_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.saturating_mul(2)
}

/// JSON extractor settings: body size limit and errors in our JSON shape.
///
/// Applies to the `web::Json` endpoints, which carry no audio. Endpoints
/// with `audioData` read their body through `read_json_body` so the limit
/// follows runtime config updates.
pub fn json_config(max_upload_bytes: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(json_body_limit(max_upload_bytes))
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid JSON body: {}", err)).into())
}

/// Buffer and parse a JSON body, capped by the current upload limit.
pub(crate) async fn read_json_body<T: DeserializeOwned>(
    mut payload: web::Payload,
    max_upload_bytes: usize,
) -> Result<T, AppError> {
    let limit = json_body_limit(max_upload_bytes);
    let mut body = Vec::new();

    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Failed to read request body: {}", e)))?;
        if body.len() + chunk.len() > limit {
            return Err(AppError::ValidationError(format!(
                "Request body too large (max: {} bytes)",
                limit
            )));
        }
        body.extend_from_slice(&chunk);
    }

    serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// Decode the `audioData` field of a request.
///
/// Accepts plain base64 or a `data:audio/...;base64,` URL as produced by
/// `FileReader.readAsDataURL` in browsers.
pub(crate) fn decode_audio_data(audio_data: Option<&str>, max_bytes: usize) -> Result<Vec<u8>, AppError> {
    let encoded = audio_data
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing required field: audioData".to_string()))?;

    let encoded = match encoded.strip_prefix("data:") {
        Some(url) => url
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| AppError::BadRequest("Malformed data URL in audioData".to_string()))?,
        None => encoded,
    };

    let audio = STANDARD.decode(encoded)?;
    if audio.is_empty() {
        return Err(AppError::BadRequest("audioData decoded to zero bytes".to_string()));
    }
    if audio.len() > max_bytes {
        return Err(AppError::ValidationError(format!(
            "Audio too large: {} bytes (max: {} bytes)",
            audio.len(),
            max_bytes
        )));
    }

    Ok(audio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_and_data_url() {
        assert_eq!(decode_audio_data(Some("AQID"), 10).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            decode_audio_data(Some("data:audio/wav;base64,AQID"), 10).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(decode_audio_data(None, 10), Err(AppError::BadRequest(_))));
        assert!(matches!(decode_audio_data(Some("  "), 10), Err(AppError::BadRequest(_))));
        assert!(matches!(decode_audio_data(Some("not base64!"), 10), Err(AppError::BadRequest(_))));
        assert!(matches!(decode_audio_data(Some("AQID"), 2), Err(AppError::ValidationError(_))));
    }
}
