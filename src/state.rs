//! # Application State Management
//!
//! Shared state handed to every HTTP handler: the live configuration, the
//! request metrics, and the two upstream clients (speech assessment and
//! coaching text).
//!
//! ## Key Rust Concepts:
//!
//! ### Arc<RwLock<T>>
//! - **Arc**: every worker thread holds a cheap reference to the same data
//! - **RwLock**: many concurrent readers, or one writer
//! - Used for the config, the metrics and the client set, all of which can change
//!   while requests are in flight
//!
//! ### Trait Objects (`Arc<dyn PronunciationAssessor>`)
//! - Handlers only know "something that can assess audio"
//! - Production wires in the Azure and DeepSeek clients; tests wire in fakes
//! - The API keys live inside those client values and nowhere else
//!
//! ### Lock Poisoning
//! A panic while holding a lock "poisons" it. Metrics and config are plain
//! data that stay consistent between statements, so we keep using the inner
//! value (`PoisonError::into_inner`) instead of propagating the panic.

use crate::assessment::{AzureSpeechClient, PronunciationAssessor};
use crate::audio::AudioProcessor;
use crate::coaching::{CoachingClient, DeepSeekClient};
use crate::config::AppConfig;
use crate::pipeline::AnalysisPipeline;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// The upstream services a request may call.
#[derive(Clone)]
pub struct UpstreamClients {
    pub assessor: Arc<dyn PronunciationAssessor>,
    pub coaching: Arc<dyn CoachingClient>,
}

impl UpstreamClients {
    /// Build the real vendor clients from configuration.
    ///
    /// Missing credentials are fine here: an unconfigured client answers
    /// every call with a "not configured" error.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            assessor: Arc::new(AzureSpeechClient::new(config.azure.clone())?),
            coaching: Arc::new(DeepSeekClient::new(config.coach.clone())?),
        })
    }
}

/// State shared across all HTTP request handlers.
///
/// `Clone` is cheap: every field is an `Arc` or `Copy`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request and upstream counters, updated by middleware and handlers
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,

    clients: Arc<RwLock<UpstreamClients>>,

    /// Rebuild `clients` from the new config after a runtime update.
    /// Off when the clients were injected (tests).
    rebuild_clients: bool,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of 4xx/5xx responses since server start
    pub error_count: u64,

    /// Requests currently being processed
    pub in_flight: u32,

    pub assessments_succeeded: u64,
    pub assessments_failed: u64,

    /// Coaching calls that returned model text
    pub coaching_completed: u64,

    /// Coaching calls answered with the fallback text
    pub coaching_fallbacks: u64,

    /// Per-endpoint statistics, keyed like "POST /api/v1/analyze"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance numbers for one endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,

    /// Cumulative processing time in milliseconds
    pub total_duration_ms: u64,

    pub error_count: u64,
}

impl AppState {
    /// Create state around already-built clients.
    pub fn new(config: AppConfig, clients: UpstreamClients) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            clients: Arc::new(RwLock::new(clients)),
            rebuild_clients: false,
        }
    }

    /// Create state with the real vendor clients built from `config`.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let clients = UpstreamClients::from_config(&config)?;
        let mut state = Self::new(config, clients);
        state.rebuild_clients = true;
        Ok(state)
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the lock immediately so other requests aren't blocked.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Validate and install a new configuration.
    ///
    /// Upstream clients carry their own copy of the vendor settings, so they
    /// are rebuilt before the new config is published.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        new_config.validate().map_err(|e| e.to_string())?;

        if self.rebuild_clients {
            let clients = UpstreamClients::from_config(&new_config).map_err(|e| e.to_string())?;
            *self.clients.write().unwrap_or_else(PoisonError::into_inner) = clients;
        }

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = new_config;
        Ok(())
    }

    pub fn assessor(&self) -> Arc<dyn PronunciationAssessor> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).assessor.clone()
    }

    pub fn coaching(&self) -> Arc<dyn CoachingClient> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).coaching.clone()
    }

    /// Audio processor for the current audio settings.
    pub fn audio_processor(&self) -> AudioProcessor {
        AudioProcessor::new(self.get_config().audio)
    }

    /// Analysis pipeline over the current clients.
    pub fn pipeline(&self) -> AnalysisPipeline {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner).clone();
        AnalysisPipeline::new(clients.assessor, clients.coaching)
    }

    fn with_metrics<F: FnOnce(&mut AppMetrics)>(&self, update: F) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut metrics);
    }

    /// Called by middleware when a request enters the app.
    pub fn request_started(&self) {
        self.with_metrics(|m| {
            m.request_count += 1;
            m.in_flight += 1;
        });
    }

    /// Called by middleware when a request leaves the app, successful or not.
    pub fn request_finished(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        self.with_metrics(|m| {
            m.in_flight = m.in_flight.saturating_sub(1);
            if is_error {
                m.error_count += 1;
            }

            let endpoint_metric = m.endpoint_metrics.entry(endpoint.to_string()).or_default();
            endpoint_metric.request_count += 1;
            endpoint_metric.total_duration_ms += duration_ms;
            if is_error {
                endpoint_metric.error_count += 1;
            }
        });
    }

    pub fn record_assessment(&self, succeeded: bool) {
        self.with_metrics(|m| {
            if succeeded {
                m.assessments_succeeded += 1;
            } else {
                m.assessments_failed += 1;
            }
        });
    }

    pub fn record_coaching(&self, fallback: bool) {
        self.with_metrics(|m| {
            if fallback {
                m.coaching_fallbacks += 1;
            } else {
                m.coaching_completed += 1;
            }
        });
    }

    /// Consistent copy of the metrics, taken under one read lock.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl AppMetrics {
    /// Fraction of requests that ended in an error (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        ratio(self.error_count, self.request_count)
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        ratio(self.total_duration_ms, self.request_count)
    }

    pub fn error_rate(&self) -> f64 {
        ratio(self.error_count, self.request_count)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64
    } else {
        0.0
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::coaching::testing::FakeCoach;
    use crate::pipeline::testing::FakeAssessor;

    /// State with fake upstreams and default config.
    pub fn state_with(assessor: FakeAssessor, coach: FakeCoach) -> AppState {
        AppState::new(
            AppConfig::default(),
            UpstreamClients {
                assessor: Arc::new(assessor),
                coaching: Arc::new(coach),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::state_with;
    use super::*;
    use crate::coaching::testing::FakeCoach;
    use crate::pipeline::testing::FakeAssessor;

    fn state() -> AppState {
        state_with(FakeAssessor::succeeding(), FakeCoach { answer: Ok("ok".to_string()) })
    }

    #[test]
    fn test_request_metrics() {
        let state = state();
        state.request_started();
        state.request_started();
        assert_eq!(state.get_metrics_snapshot().in_flight, 2);

        state.request_finished("POST /api/v1/analyze", 30, false);
        state.request_finished("POST /api/v1/analyze", 10, true);

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.request_count, 2);
        assert_eq!(metrics.in_flight, 0);
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.error_rate(), 0.5);

        let endpoint = &metrics.endpoint_metrics["POST /api/v1/analyze"];
        assert_eq!(endpoint.average_duration_ms(), 20.0);
        assert_eq!(endpoint.error_rate(), 0.5);
    }

    #[test]
    fn test_in_flight_never_underflows() {
        let state = state();
        state.request_finished("GET /health", 1, false);
        assert_eq!(state.get_metrics_snapshot().in_flight, 0);
    }

    #[test]
    fn test_upstream_counters() {
        let state = state();
        state.record_assessment(true);
        state.record_assessment(false);
        state.record_coaching(true);

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.assessments_succeeded, 1);
        assert_eq!(metrics.assessments_failed, 1);
        assert_eq!(metrics.coaching_fallbacks, 1);
        assert_eq!(metrics.coaching_completed, 0);
    }

    #[test]
    fn test_update_config_validates() {
        let state = state();

        let mut config = state.get_config();
        config.azure.language = "en-GB".to_string();
        assert!(state.update_config(config).is_ok());
        assert_eq!(state.get_config().azure.language, "en-GB");

        let mut config = state.get_config();
        config.server.port = 0;
        assert!(state.update_config(config).is_err());
        assert_eq!(state.get_config().server.port, 8080);
    }

    #[test]
    fn test_real_clients_start_unconfigured() {
        let state = AppState::from_config(AppConfig::default()).unwrap();
        assert!(!state.assessor().is_configured());
        assert!(!state.coaching().is_configured());

        let mut config = state.get_config();
        config.coach.api_key = Some("sk-live".to_string());
        state.update_config(config).unwrap();
        assert!(state.coaching().is_configured());
    }
}
