//! Process-environment credentials
//!
//! Vendor API keys and engine secrets are read once at startup and treated
//! as immutable for the process lifetime.

use std::env;

use crate::ConfigError;

/// Snapshot of vendor credentials and engine secrets.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub deepgram_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub cartesia_api_key: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    /// AES-256 key for provider-credential blobs at rest (64 hex chars).
    pub encryption_key: Option<String>,
    /// HMAC key for tenant API-key digests.
    pub api_key_secret: Option<String>,
    /// HS256 key for short-lived media WebSocket tokens.
    pub jwt_secret: Option<String>,
}

impl ProviderCredentials {
    /// Read all known keys from the process environment.
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            env::var(name).ok().filter(|v| !v.trim().is_empty())
        }

        Self {
            openai_api_key: var("OPENAI_API_KEY"),
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            deepgram_api_key: var("DEEPGRAM_API_KEY"),
            elevenlabs_api_key: var("ELEVENLABS_API_KEY"),
            cartesia_api_key: var("CARTESIA_API_KEY"),
            twilio_account_sid: var("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: var("TWILIO_AUTH_TOKEN"),
            encryption_key: var("ENCRYPTION_KEY"),
            api_key_secret: var("API_KEY_SECRET"),
            jwt_secret: var("JWT_SECRET"),
        }
    }

    /// Key for the named provider role, or a config error naming the
    /// variable that has to be set.
    pub fn require(&self, env_name: &str) -> Result<&str, ConfigError> {
        let value = match env_name {
            "OPENAI_API_KEY" => &self.openai_api_key,
            "ANTHROPIC_API_KEY" => &self.anthropic_api_key,
            "DEEPGRAM_API_KEY" => &self.deepgram_api_key,
            "ELEVENLABS_API_KEY" => &self.elevenlabs_api_key,
            "CARTESIA_API_KEY" => &self.cartesia_api_key,
            "TWILIO_ACCOUNT_SID" => &self.twilio_account_sid,
            "TWILIO_AUTH_TOKEN" => &self.twilio_auth_token,
            "ENCRYPTION_KEY" => &self.encryption_key,
            "API_KEY_SECRET" => &self.api_key_secret,
            "JWT_SECRET" => &self.jwt_secret,
            _ => &None,
        };
        value
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnv(env_name.to_string()))
    }
}
