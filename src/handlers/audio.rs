use crate::audio::{encode_wav, DecodedAudioBuffer, DownmixPolicy};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde::Deserialize;

pub const CONVERTED_HEADER: &str = "x-audio-converted";
pub const FORMAT_HEADER: &str = "x-audio-format";

/// Body of `POST /api/v1/audio/encode`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeRequest {
    pub sample_rate: u32,
    /// One array of samples per channel, values in [-1, 1]
    pub channels: Vec<Vec<f32>>,
    /// Collapse channels this way first; by default only channel 0 is kept
    pub downmix: Option<DownmixPolicy>,
}

/// Encode decoded sample arrays into a mono 16-bit WAV file.
///
/// ## Endpoint: `POST /api/v1/audio/encode`
///
/// ## Request:
/// ```json
/// { "sampleRate": 16000, "channels": [[0.0, 0.5, -0.5]] }
/// ```
///
/// ## Response:
/// `audio/wav` bytes: 44-byte header plus two bytes per sample.
pub async fn encode_audio(body: web::Json<EncodeRequest>) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let mut buffer = DecodedAudioBuffer::new(request.sample_rate, request.channels)?;
    if let Some(policy) = request.downmix {
        buffer = buffer.downmixed(policy);
    }

    Ok(HttpResponse::Ok().content_type("audio/wav").body(encode_wav(&buffer)))
}

/// Convert an uploaded recording into the canonical WAV sent for assessment.
///
/// ## Endpoint: `POST /api/v1/audio/convert`
///
/// ## Request:
/// Multipart form data with an audio file field named "audio"
///
/// ## Response:
/// The converted file, or the original bytes when the recording is not a
/// WAV we can decode. `x-audio-converted: true|false` says which, and
/// `x-audio-format` names the container of the returned bytes.
pub async fn convert_audio(
    state: web::Data<AppState>,
    mut payload: actix_multipart::Multipart,
) -> AppResult<HttpResponse> {
    let processor = state.audio_processor();
    let max_bytes = processor.settings().max_upload_bytes;

    let mut audio_data: Option<Vec<u8>> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::ValidationError(format!("Multipart error: {}", e)))?;

        let is_audio = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map_or(false, |name| name == "audio");
        if !is_audio {
            // Drain fields we don't use so the stream can advance
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| AppError::ValidationError(format!("Chunk error: {}", e)))?;
            }
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::ValidationError(format!("Chunk error: {}", e)))?;
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::ValidationError(format!(
                    "File too large (max: {} bytes)",
                    max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        audio_data = Some(bytes);
    }

    let audio = audio_data.ok_or_else(|| AppError::ValidationError("No audio file provided".to_string()))?;
    let prepared = processor.prepare(audio)?;

    let mut response = HttpResponse::Ok();
    response
        .content_type(prepared.content_type())
        .insert_header((CONVERTED_HEADER, prepared.converted.to_string()))
        .insert_header((FORMAT_HEADER, prepared.format.as_str()));

    Ok(response.body(prepared.bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::{decode_wav, WavHeader};
    use crate::coaching::testing::FakeCoach;
    use crate::handlers::configure_routes;
    use crate::pipeline::testing::FakeAssessor;
    use crate::state::testing::state_with;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    const BOUNDARY: &str = "----coachboundary";

    fn multipart_body(field: &str, file: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"take.bin\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            b = BOUNDARY,
            f = field
        )
        .into_bytes();
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn state() -> AppState {
        state_with(FakeAssessor::succeeding(), FakeCoach { answer: Ok(String::new()) })
    }

    #[actix_web::test]
    async fn test_encode_endpoint_uses_first_channel() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(state())).configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/audio/encode")
            .set_json(json!({ "sampleRate": 16000, "channels": [[0.0, 1.0], [0.5, 0.5]] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "audio/wav");

        let bytes = test::read_body(resp).await;
        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[44..48], &[0x00, 0x00, 0xff, 0x7f]);
    }

    #[actix_web::test]
    async fn test_encode_endpoint_average_downmix() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(state())).configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/audio/encode")
            .set_json(json!({ "sampleRate": 8000, "channels": [[1.0], [0.0]], "downmix": "average" }))
            .to_request();
        let bytes = test::call_and_read_body(&app, req).await;

        let decoded = decode_wav(&bytes).unwrap();
        assert_eq!(decoded.sample_rate(), 8000);
        assert!((decoded.primary_channel()[0] - 0.5).abs() < 1e-3);
    }

    #[actix_web::test]
    async fn test_encode_rejects_ragged_channels() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(state())).configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/audio/encode")
            .set_json(json!({ "sampleRate": 16000, "channels": [[0.0, 0.1], [0.0]] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_convert_resamples_wav_upload() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(state())).configure(configure_routes),
        )
        .await;

        let upload = encode_wav(&DecodedAudioBuffer::mono(48000, vec![0.25; 4800]));
        let req = test::TestRequest::post()
            .uri("/api/v1/audio/convert")
            .insert_header(("content-type", format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(multipart_body("audio", &upload))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(CONVERTED_HEADER).unwrap(), "true");
        assert_eq!(resp.headers().get(FORMAT_HEADER).unwrap(), "wav");

        let bytes = test::read_body(resp).await;
        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.sample_rate, 16000);
        assert_eq!(header.data_size, 1600 * 2);
    }

    #[actix_web::test]
    async fn test_convert_passes_through_other_formats() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(state())).configure(configure_routes),
        )
        .await;

        let webm = [0x1a, 0x45, 0xdf, 0xa3, 0x01, 0x02, 0x03];
        let req = test::TestRequest::post()
            .uri("/api/v1/audio/convert")
            .insert_header(("content-type", format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(multipart_body("audio", &webm))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.headers().get(CONVERTED_HEADER).unwrap(), "false");
        assert_eq!(&test::read_body(resp).await[..], &webm[..]);
    }

    #[actix_web::test]
    async fn test_convert_requires_audio_field() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(state())).configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/audio/convert")
            .insert_header(("content-type", format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(multipart_body("notes", b"hello"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
