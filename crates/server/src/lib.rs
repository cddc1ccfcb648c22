//! Voice engine server
//!
//! HTTP surface (call creation, session management, carrier webhooks) and
//! the per-call media WebSocket.

pub mod auth;
pub mod http;
pub mod state;
pub mod websocket;

pub use auth::MediaTokenIssuer;
pub use http::create_router;
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use voice_engine_core::EngineError;

/// Server-surface errors, mapped onto HTTP statuses.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Quota(_) => StatusCode::PAYMENT_REQUIRED,
            ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ServerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(e) => ServerError::Validation(e),
            EngineError::Auth(e) => ServerError::Auth(e),
            EngineError::NotFound(e) => ServerError::NotFound(e),
            EngineError::Conflict(e) => ServerError::Conflict(e),
            EngineError::QuotaExceeded(e) => ServerError::Quota(e),
            EngineError::Provider(e) => ServerError::Upstream(e),
            EngineError::Transport(e) | EngineError::Fatal(e) => ServerError::Internal(e),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        (
            status,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let cases = [
            (EngineError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (EngineError::Auth("a".into()), StatusCode::UNAUTHORIZED),
            (EngineError::NotFound("n".into()), StatusCode::NOT_FOUND),
            (EngineError::Conflict("c".into()), StatusCode::CONFLICT),
            (
                EngineError::QuotaExceeded("q".into()),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (EngineError::Provider("p".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            assert_eq!(ServerError::from(err).status(), expected);
        }
    }
}
