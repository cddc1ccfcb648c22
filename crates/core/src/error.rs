//! Engine error taxonomy
//!
//! Recoverable per-turn failures (provider errors) are caught at the
//! orchestration boundary and never terminate a call by themselves.

use thiserror::Error;

/// Convenience result alias for engine-level operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine-wide error kinds.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed request or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unauthenticated or insufficient scope.
    #[error("auth error: {0}")]
    Auth(String),

    /// Entity absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Concurrent-call or plan-limit violation.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Non-2xx or timeout from STT/LLM/TTS/tool server.
    /// Within a session this is a recoverable turn failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// Client disconnect or socket failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Irrecoverable failure; the session is force-terminated.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl EngineError {
    /// Whether a session hitting this error should continue the call.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::Provider(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_are_recoverable() {
        assert!(EngineError::Provider("stt 500".into()).is_recoverable());
        assert!(!EngineError::Transport("closed".into()).is_recoverable());
        assert!(!EngineError::Fatal("db down".into()).is_recoverable());
    }
}
