//! Media WebSocket tokens
//!
//! The media socket has no session cookie or API key; instead each call is
//! issued a short-lived HS256 token bound to its call id. The token is
//! minted at call creation (web response, carrier TwiML URL) and verified
//! before the WebSocket upgrade, which closes the session-hijack hole of an
//! unauthenticated `/ws/{callId}`.

use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use voice_engine_core::EngineError;

#[derive(Debug, Serialize, Deserialize)]
struct MediaClaims {
    /// Call id the token is bound to.
    sub: String,
    exp: u64,
}

/// Mints and verifies per-call media tokens.
pub struct MediaTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl MediaTokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Mint a token for one call.
    pub fn mint(&self, call_id: &str) -> Result<String, EngineError> {
        let exp = chrono::Utc::now().timestamp() as u64 + self.ttl.as_secs();
        let claims = MediaClaims {
            sub: call_id.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| EngineError::Fatal(format!("token mint failed: {e}")))
    }

    /// Verify a token and its call-id binding.
    pub fn verify(&self, token: &str, call_id: &str) -> Result<(), EngineError> {
        let data = decode::<MediaClaims>(token, &self.decoding, &Validation::default())
            .map_err(|e| EngineError::Auth(format!("invalid media token: {e}")))?;
        if data.claims.sub != call_id {
            return Err(EngineError::Auth(
                "media token is bound to a different call".to_string(),
            ));
        }
        Ok(())
    }
}
