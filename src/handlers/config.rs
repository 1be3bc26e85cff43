use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Current configuration with secrets replaced by `configured` flags.
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config.redacted()
    })))
}

/// Partial update of non-secret settings, e.g. `{"audio": {"downmix": "average"}}`.
pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state.update_config(current_config.clone()).map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": current_config.redacted()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching::testing::FakeCoach;
    use crate::handlers::configure_routes;
    use crate::pipeline::testing::FakeAssessor;
    use crate::state::testing::state_with;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_get_config_is_redacted() {
        let state = state_with(FakeAssessor::succeeding(), FakeCoach { answer: Ok(String::new()) });
        {
            let mut config = state.config.write().unwrap();
            config.coach.api_key = Some("sk-very-secret".to_string());
        }
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["config"]["coach"]["configured"], true);
        assert!(!body.to_string().contains("sk-very-secret"));
    }

    #[actix_web::test]
    async fn test_update_config() {
        let state = state_with(FakeAssessor::succeeding(), FakeCoach { answer: Ok(String::new()) });
        let app = test::init_service(
            App::new().app_data(web::Data::new(state.clone())).configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/v1/config")
            .set_json(json!({ "audio": { "target_sample_rate": 8000 }, "azure": { "language": "en-GB" } }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["updated_config"]["audio"]["target_sample_rate"], 8000);

        let config = state.get_config();
        assert_eq!(config.audio.target_sample_rate, Some(8000));
        assert_eq!(config.azure.language, "en-GB");

        let req = test::TestRequest::put()
            .uri("/api/v1/config")
            .set_json(json!({ "server": { "port": 0 } }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
