use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let assessor = state.assessor();
    let coaching = state.coaching();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "in_flight": metrics.in_flight
        },
        "memory": get_memory_info(),
        "upstreams": {
            "assessment": {
                "provider": "azure-speech",
                "configured": assessor.is_configured(),
                "region": config.azure.region,
                "language": config.azure.language
            },
            "coaching": {
                "provider": "deepseek",
                "configured": coaching.is_configured(),
                "model": coaching.model()
            }
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoints: Vec<_> = metrics.endpoint_metrics.iter().collect();
    endpoints.sort_by(|a, b| a.0.cmp(b.0));

    let endpoint_stats: Vec<_> = endpoints
        .into_iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "in_flight": metrics.in_flight,
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "analysis": {
            "assessments_succeeded": metrics.assessments_succeeded,
            "assessments_failed": metrics.assessments_failed,
            "coaching_completed": metrics.coaching_completed,
            "coaching_fallbacks": metrics.coaching_fallbacks
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info()
    }))
}

/// Resident and virtual memory of this process, read from procfs on Linux.
fn get_memory_info() -> serde_json::Value {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", std::process::id())) {
            let field_bytes = |name: &str| {
                status
                    .lines()
                    .find(|line| line.starts_with(name))
                    .and_then(|line| line.split_whitespace().nth(1))
                    .and_then(|kb| kb.parse::<u64>().ok())
                    .map_or(0, |kb| kb * 1024)
            };

            return json!({
                "resident_memory_bytes": field_bytes("VmRSS:"),
                "virtual_memory_bytes": field_bytes("VmSize:"),
                "available": true
            });
        }
    }

    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": "Memory info not available on this platform"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching::testing::FakeCoach;
    use crate::coaching::CoachingError;
    use crate::pipeline::testing::FakeAssessor;
    use crate::state::testing::state_with;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_reports_upstreams() {
        let state = state_with(
            FakeAssessor::succeeding(),
            FakeCoach { answer: Err(CoachingError::NotConfigured) },
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/health", web::get().to(health_check)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["upstreams"]["assessment"]["configured"], true);
        assert_eq!(body["upstreams"]["coaching"]["configured"], false);
        assert_eq!(body["upstreams"]["coaching"]["model"], "fake-model");
    }

    #[actix_web::test]
    async fn test_metrics_lists_endpoints_in_order() {
        let state = state_with(FakeAssessor::succeeding(), FakeCoach { answer: Ok(String::new()) });
        state.request_finished("POST /b", 4, false);
        state.request_finished("GET /a", 2, true);
        state.record_coaching(true);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/metrics", web::get().to(detailed_metrics)),
        )
        .await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["endpoints"][0]["endpoint"], "GET /a");
        assert_eq!(body["endpoints"][1]["endpoint"], "POST /b");
        assert_eq!(body["analysis"]["coaching_fallbacks"], 1);
    }
}
