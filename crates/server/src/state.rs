//! Application state

use std::sync::Arc;
use std::time::Duration;

use voice_engine_config::{ProviderCredentials, Settings};
use voice_engine_engine::{RecordingWriter, SessionRegistry};
use voice_engine_persistence::{CallStore, InMemoryDirectory, InMemoryStore};
use voice_engine_telephony::TwilioClient;

use crate::auth::MediaTokenIssuer;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub credentials: Arc<ProviderCredentials>,
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn CallStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub recorder: RecordingWriter,
    pub tokens: Arc<MediaTokenIssuer>,
    pub twilio: Option<TwilioClient>,
}

impl AppState {
    /// Build state over the given store; the directory starts empty and is
    /// populated by the control surface (or tests).
    pub fn new(
        settings: Settings,
        credentials: ProviderCredentials,
        store: Arc<dyn CallStore>,
    ) -> Self {
        let registry = SessionRegistry::new(settings.session.max_sessions);
        let recorder = RecordingWriter::new(settings.recordings_dir.clone());
        let ttl = Duration::from_secs(settings.server.media_token_ttl_secs);
        let jwt_secret = credentials
            .jwt_secret
            .clone()
            .unwrap_or_else(|| "insecure-dev-secret".to_string());
        if credentials.jwt_secret.is_none() {
            tracing::warn!("JWT_SECRET not set; media tokens use an insecure dev secret");
        }
        let twilio = match (&credentials.twilio_account_sid, &credentials.twilio_auth_token) {
            (Some(sid), Some(token)) => Some(TwilioClient::new(sid.clone(), token.clone())),
            _ => None,
        };

        Self {
            settings,
            credentials: Arc::new(credentials),
            registry,
            store,
            directory: InMemoryDirectory::new(),
            recorder,
            tokens: Arc::new(MediaTokenIssuer::new(&jwt_secret, ttl)),
            twilio,
        }
    }

    /// In-memory state for tests and single-node development.
    pub fn in_memory(settings: Settings, credentials: ProviderCredentials) -> Self {
        Self::new(settings, credentials, InMemoryStore::new())
    }

    /// Public WebSocket URL for one call, token included.
    pub fn media_ws_url(&self, call_id: &str, token: &str) -> String {
        let base = self.settings.server.public_ws_url.trim_end_matches('/');
        format!("{base}/ws/{call_id}?token={token}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_url_joins_base_and_token() {
        let mut settings = Settings::default();
        settings.server.public_ws_url = "wss://engine.example.com/".to_string();
        let state = AppState::in_memory(settings, ProviderCredentials::default());
        assert_eq!(
            state.media_ws_url("c1", "tok"),
            "wss://engine.example.com/ws/c1?token=tok"
        );
    }
}
