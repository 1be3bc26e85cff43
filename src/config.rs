//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Vendor credential variables (AZURE_SPEECH_KEY, DEEPSEEK_API_KEY, ...)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **Option<T>**: Secrets are optional so the server can start without them
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Vendor variables (AZURE_SPEECH_KEY, AZURE_SPEECH_REGION, DEEPSEEK_API_KEY, DEEPSEEK_API_URL)
//!    and platform variables (HOST, PORT)
//! 2. Environment variables (APP_SERVER__HOST, APP_COACH__MAX_TOKENS, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! ## Secrets:
//! API keys only ever live in this server process. They are handed to the
//! upstream clients at construction time and never serialized back out to
//! API consumers (see `redacted()`).

use crate::audio::DownmixPolicy;
use anyhow::Result;              // Better error handling with context
use serde::{Deserialize, Serialize};  // For converting to/from TOML, JSON, etc.
use std::env;                    // For reading environment variables

/// Highest resample target accepted by `validate`.
pub const MAX_TARGET_SAMPLE_RATE: u32 = 192_000;

/// Main application configuration that contains all settings.
///
/// ## Rust Concepts:
/// - **#[derive(...)]**: Automatically implements common traits:
///   - `Debug`: Allows printing with {:?} for debugging
///   - `Clone`: Allows making copies of the struct
///   - `Serialize`: Can convert this struct to JSON, TOML, etc.
///   - `Deserialize`: Can create this struct from JSON, TOML, etc.
///
/// ## Why separate config structs:
/// Each upstream service (speech assessment, coaching text) gets its own
/// group so credentials and tuning for one never leak into the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub azure: AzureSpeechConfig,
    pub coach: CoachConfig,
    pub audio: AudioSettings,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Azure Speech pronunciation assessment settings.
///
/// ## Fields:
/// - `key` / `region`: Subscription credentials (AZURE_SPEECH_KEY / AZURE_SPEECH_REGION)
/// - `language`: Default recognition locale when a request does not name one
/// - `endpoint`: Full recognition URL, overriding the one derived from `region`
/// - `timeout_secs`: Upper bound for one assessment call
/// - `enable_prosody`: Ask the service for a prosody score as well
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureSpeechConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub enable_prosody: bool,
}

impl AzureSpeechConfig {
    pub fn is_configured(&self) -> bool {
        has_value(&self.key) && (has_value(&self.region) || has_value(&self.endpoint))
    }
}

/// Coaching-text (DeepSeek chat completion) settings.
///
/// ## Fields:
/// - `api_key`: Bearer token (DEEPSEEK_API_KEY)
/// - `api_url`: Base URL of the OpenAI-compatible API (DEEPSEEK_API_URL)
/// - `model`, `temperature`, `max_tokens`: Sampling parameters for the completion
/// - `system_prompt`: Replaces the built-in coaching instructions when set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl CoachConfig {
    pub fn is_configured(&self) -> bool {
        has_value(&self.api_key)
    }
}

/// Recording conversion settings.
///
/// ## Fields:
/// - `target_sample_rate`: Resample converted WAV to this rate (`None` keeps the native rate)
/// - `downmix`: How multi-channel recordings collapse to mono
/// - `max_upload_bytes`: Largest recording accepted by the upload endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sample_rate: Option<u32>,
    pub downmix: DownmixPolicy,
    pub max_upload_bytes: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            target_sample_rate: Some(16000),  // Azure prefers 16kHz
            downmix: DownmixPolicy::FirstChannel,
            max_upload_bytes: 10 * 1024 * 1024,  // 10MB is minutes of 16kHz mono audio
        }
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration file exists.
/// Without credentials the server still starts; the upstream endpoints then
/// report that the service is not configured.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 8080,                     // Common development port
            },
            azure: AzureSpeechConfig {
                key: None,
                region: None,
                language: "en-US".to_string(),
                endpoint: None,
                timeout_secs: 30,
                enable_prosody: true,
            },
            coach: CoachConfig {
                api_key: None,
                api_url: "https://api.deepseek.com".to_string(),
                model: "deepseek-chat".to_string(),
                temperature: 0.7,
                max_tokens: 800,
                timeout_secs: 30,
                system_prompt: None,
            },
            audio: AudioSettings::default(),
        }
    }
}

/// Implementation block for AppConfig - adds methods to the struct.
impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_ (nested keys use `__`)
    /// 4. Handle vendor and platform variables that don't follow the APP_ convention
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_AUDIO__DOWNMIX=average`: Average channels instead of keeping the first
    /// - `AZURE_SPEECH_KEY=...`: Azure subscription key
    /// - `PORT=3000`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            // 1. Start with defaults - converts our Default impl to config format
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Load from config.toml file (if it exists) - required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // 3. Load from environment variables with APP_ prefix
            // Double underscores separate levels so field names may keep single ones
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Variables used by deployment platforms and by the vendor SDK docs
        let overrides = [
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("AZURE_SPEECH_KEY", "azure.key"),
            ("AZURE_SPEECH_REGION", "azure.region"),
            ("DEEPSEEK_API_KEY", "coach.api_key"),
            ("DEEPSEEK_API_URL", "coach.api_url"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = env::var(var) {
                settings = settings.set_override(key, value)?;
            }
        }

        // Build the final configuration and convert it back to our AppConfig struct
        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Upstream timeouts are positive
    /// - The resample target is within 1..=192 kHz
    /// - Sampling parameters are inside the ranges the chat API accepts
    /// - Audio limits are positive
    ///
    /// Missing credentials are *not* an error: they are reported per request.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.azure.timeout_secs == 0 || self.coach.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Upstream timeouts must be greater than 0"));
        }

        if self.azure.language.trim().is_empty() {
            return Err(anyhow::anyhow!("Assessment language cannot be empty"));
        }

        if !(0.0..=2.0).contains(&self.coach.temperature) {
            return Err(anyhow::anyhow!("Coach temperature must be between 0 and 2"));
        }

        if self.coach.max_tokens == 0 {
            return Err(anyhow::anyhow!("Coach max_tokens must be greater than 0"));
        }

        if let Some(rate) = self.audio.target_sample_rate {
            if rate == 0 || rate > MAX_TARGET_SAMPLE_RATE {
                return Err(anyhow::anyhow!(
                    "Target sample rate must be between 1 and {} Hz",
                    MAX_TARGET_SAMPLE_RATE
                ));
            }
        }

        if self.audio.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        Ok(())  // All validation passed
    }

    /// Update non-secret configuration fields from a JSON string.
    ///
    /// ## Partial updates:
    /// Only the fields present in the JSON change. For example
    /// `{"coach": {"temperature": 0.3}}` changes only the temperature.
    ///
    /// Credentials cannot be changed here: the upstream clients were built
    /// with them at startup, and this endpoint is reachable over HTTP.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        // Parse the JSON string into a generic value
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = u16::try_from(port)
                    .map_err(|_| anyhow::anyhow!("Server port {} is out of range", port))?;
            }
        }

        if let Some(azure) = partial_config.get("azure") {
            if let Some(language) = azure.get("language").and_then(|v| v.as_str()) {
                self.azure.language = language.to_string();
            }
            if let Some(prosody) = azure.get("enable_prosody").and_then(|v| v.as_bool()) {
                self.azure.enable_prosody = prosody;
            }
        }

        if let Some(coach) = partial_config.get("coach") {
            if let Some(model) = coach.get("model").and_then(|v| v.as_str()) {
                self.coach.model = model.to_string();
            }
            if let Some(temperature) = coach.get("temperature").and_then(|v| v.as_f64()) {
                self.coach.temperature = temperature as f32;
            }
            if let Some(max_tokens) = coach.get("max_tokens").and_then(|v| v.as_u64()) {
                self.coach.max_tokens = u32::try_from(max_tokens)
                    .map_err(|_| anyhow::anyhow!("Coach max_tokens {} is out of range", max_tokens))?;
            }
        }

        if let Some(audio) = partial_config.get("audio") {
            match audio.get("target_sample_rate") {
                Some(serde_json::Value::Null) => self.audio.target_sample_rate = None,
                Some(rate) => {
                    let rate = rate
                        .as_u64()
                        .ok_or_else(|| anyhow::anyhow!("Target sample rate must be a positive integer or null"))?;
                    let rate = u32::try_from(rate)
                        .map_err(|_| anyhow::anyhow!("Target sample rate {} is out of range", rate))?;
                    self.audio.target_sample_rate = Some(rate);
                }
                None => {}
            }
            if let Some(downmix) = audio.get("downmix") {
                self.audio.downmix = serde_json::from_value(downmix.clone())?;
            }
            if let Some(max) = audio.get("max_upload_bytes").and_then(|v| v.as_u64()) {
                self.audio.max_upload_bytes = usize::try_from(max)
                    .map_err(|_| anyhow::anyhow!("Max upload size {} is out of range", max))?;
            }
        }

        // Validate the updated configuration to ensure it's still valid
        self.validate()?;
        Ok(())
    }

    /// JSON view of the configuration that is safe to return to clients.
    ///
    /// Secrets are replaced by booleans saying whether they are set.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "server": {
                "host": self.server.host,
                "port": self.server.port
            },
            "azure": {
                "configured": self.azure.is_configured(),
                "region": self.azure.region,
                "language": self.azure.language,
                "custom_endpoint": self.azure.endpoint.is_some(),
                "timeout_secs": self.azure.timeout_secs,
                "enable_prosody": self.azure.enable_prosody
            },
            "coach": {
                "configured": self.coach.is_configured(),
                "api_url": self.coach.api_url,
                "model": self.coach.model,
                "temperature": self.coach.temperature,
                "max_tokens": self.coach.max_tokens,
                "timeout_secs": self.coach.timeout_secs,
                "custom_system_prompt": self.coach.system_prompt.is_some()
            },
            "audio": {
                "target_sample_rate": self.audio.target_sample_rate,
                "downmix": self.audio.downmix,
                "max_upload_bytes": self.audio.max_upload_bytes
            }
        })
    }
}
