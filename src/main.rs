//! # Pronunciation Coach Backend - Main Entry Point
//!
//! HTTP server behind the pronunciation practice page. The browser records
//! speech and posts it here; the server converts the recording to canonical
//! WAV, scores it with Azure Speech pronunciation assessment, and asks a chat
//! model (DeepSeek) for a short coaching note. API keys stay on the server.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: Non-blocking I/O while we wait on the upstream services
//! - **Trait objects**: Upstream clients are injected behind traits, so tests swap in fakes
//! - **Arc/RwLock**: Shared state across actix worker threads
//! - **Result<T, E>**: Startup errors bubble up with `?` through `anyhow`
//!
//! ## Architecture Overview:
//! ```text
//! HTTP Request → Middleware → Handler → Audio Processor → Azure Speech → DeepSeek → JSON Response
//!                     ↓
//!            (Logging, Metrics, CORS)
//! ```

mod assessment;  // Azure pronunciation assessment client (assessment/ directory)
mod audio;       // Decoded buffers, WAV codec, recording conversion (audio/ directory)
mod coaching;    // DeepSeek coaching text with fallback (coaching/ directory)
mod config;      // Configuration management (config.rs)
mod error;       // Error handling types (error.rs)
mod handlers;    // HTTP request handlers (handlers/ directory)
mod health;      // Health check endpoints (health.rs)
mod middleware;  // Custom middleware (middleware/ directory)
mod pipeline;    // Assessment then coaching (pipeline.rs)
mod report;      // Report shaping for the practice page (report.rs)
mod state;       // Application state management (state.rs)

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the server.
///
/// ## Startup Sequence:
/// 1. Load `.env` and initialize structured logging
/// 2. Load and validate configuration
/// 3. Build the upstream clients from configuration (keys are injected here)
/// 4. Start the HTTP server and wait for it to finish or for a shutdown signal
///
/// ## Rust Concepts:
/// - **#[actix_web::main]**: Sets up the async runtime actix needs
/// - **Result<()>**: `?` anywhere in startup aborts with a readable error
#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is normal in production
    dotenv::dotenv().ok();

    init_tracing();

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    // Credentials are optional at startup: endpoints report what is missing
    if !config.azure.is_configured() {
        warn!("Azure Speech not configured: set AZURE_SPEECH_KEY and AZURE_SPEECH_REGION");
    }
    if !config.coach.is_configured() {
        warn!("DeepSeek not configured: coaching will use the fallback text");
    }

    let app_state = AppState::from_config(config.clone())?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let max_upload_bytes = config.audio.max_upload_bytes;

    info!("Starting HTTP server on {}", bind_addr);

    // Closure runs once per worker thread
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_headers(vec!["x-request-id", "x-audio-converted", "x-audio-format"])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(handlers::json_config(max_upload_bytes))
            .wrap(cors)
            .wrap(TracingLogger::default())          // Span per request
            .wrap(middleware::MetricsMiddleware)     // Collect performance metrics
            .wrap(middleware::RequestLogging)        // Request id and access log
            .configure(handlers::configure_routes)
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Wait for whichever happens first: the server exits or we are told to stop
    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize structured logging.
///
/// `RUST_LOG` overrides the default filter, e.g.
/// `RUST_LOG=pronunciation_coach_backend=trace,reqwest=debug`.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pronunciation_coach_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM from process managers.
///
/// If a handler cannot be installed the error is logged and that signal is
/// ignored rather than stopping the server.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received SIGINT");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
