//! Voice engine configuration
//!
//! Layered settings (yaml files + `VOICE_ENGINE__`-prefixed environment
//! variables) and a one-shot snapshot of vendor credentials from the
//! process environment.

mod credentials;
mod settings;

pub use credentials::ProviderCredentials;
pub use settings::{load_settings, ObservabilityConfig, ServerConfig, SessionDefaults, Settings};

use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("missing environment variable: {0}")]
    MissingEnv(String),
}
