//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Main application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP/WS server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Session defaults applied when the assistant leaves them unset.
    #[serde(default)]
    pub session: SessionDefaults,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Recordings directory for per-call PCM blobs.
    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: String,

    /// ScyllaDB settings; empty nodes list selects the in-memory store.
    #[serde(default)]
    pub scylla: ScyllaSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }
        if self.session.max_queue_depth < 8 {
            return Err(ConfigError::InvalidValue {
                field: "session.max_queue_depth".to_string(),
                message: "queue depth below 8 drops audio under normal jitter".to_string(),
            });
        }
        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL carriers use for webhooks (API_URL).
    #[serde(default)]
    pub public_api_url: String,

    /// Public base URL for the media WebSocket (VOICE_ENGINE_WS_URL).
    #[serde(default)]
    pub public_ws_url: String,

    /// Allowed CORS origin; empty means same-origin only.
    #[serde(default)]
    pub cors_origin: String,

    /// Media token lifetime in seconds.
    #[serde(default = "default_media_token_ttl")]
    pub media_token_ttl_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3001
}
fn default_media_token_ttl() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_api_url: String::new(),
            public_ws_url: String::new(),
            cors_origin: String::new(),
            media_token_ttl_secs: default_media_token_ttl(),
        }
    }
}

/// Session-level defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    /// Hard ceiling applied to configured silence timeouts, ms.
    #[serde(default = "default_silence_ceiling")]
    pub silence_timeout_ceiling_ms: u64,

    /// Bounded depth of the per-session command queue.
    #[serde(default = "default_queue_depth")]
    pub max_queue_depth: usize,

    /// Maximum concurrent sessions before new calls are refused.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_silence_ceiling() -> u64 {
    1200
}
fn default_queue_depth() -> usize {
    256
}
fn default_max_sessions() -> usize {
    500
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            silence_timeout_ceiling_ms: default_silence_ceiling(),
            max_queue_depth: default_queue_depth(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_recordings_dir() -> String {
    "recordings".to_string()
}

/// ScyllaDB connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScyllaSettings {
    #[serde(default)]
    pub nodes: Vec<String>,

    #[serde(default = "default_keyspace")]
    pub keyspace: String,
}

fn default_keyspace() -> String {
    "voice_engine".to_string()
}

/// Load settings from files and environment.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`VOICE_ENGINE` prefix, `__` separator)
/// 2. `config/{env}.yaml` (if env specified)
/// 3. `config/default.yaml`
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_ENGINE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 3001);
        assert_eq!(settings.session.silence_timeout_ceiling_ms, 1200);
    }

    #[test]
    fn shallow_queue_rejected() {
        let mut settings = Settings::default();
        settings.session.max_queue_depth = 4;
        assert!(settings.validate().is_err());
    }
}
