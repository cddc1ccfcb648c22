//! Session output seams
//!
//! The orchestrator never touches a socket or a carrier API directly: it
//! writes through `MediaSink` (events + audio to the connected client) and
//! `CallControl` (carrier-side transfer/hangup/DTMF). The server implements
//! the former over the call's WebSocket; the telephony adapter implements
//! the latter; tests implement both over channels.

use async_trait::async_trait;

use voice_engine_core::{EngineError, ServerEvent};

/// Event and audio egress for one session.
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Deliver a JSON control event to the client, in emission order.
    async fn send_event(&self, event: ServerEvent) -> Result<(), EngineError>;

    /// Deliver one binary PCM frame to the client.
    async fn send_audio(&self, pcm: Vec<u8>) -> Result<(), EngineError>;

    /// Close the transport; further sends may fail silently.
    async fn close(&self);
}

/// Carrier-side call control for telephony sessions.
#[async_trait]
pub trait CallControl: Send + Sync {
    async fn transfer(&self, destination: &str) -> Result<(), EngineError>;

    async fn hangup(&self) -> Result<(), EngineError>;

    async fn send_digits(&self, digits: &str) -> Result<(), EngineError>;
}

/// Control handle for web sessions, where there is no carrier leg.
pub struct NoopCallControl;

#[async_trait]
impl CallControl for NoopCallControl {
    async fn transfer(&self, destination: &str) -> Result<(), EngineError> {
        tracing::debug!(destination, "transfer requested on web session; nothing to patch");
        Ok(())
    }

    async fn hangup(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn send_digits(&self, digits: &str) -> Result<(), EngineError> {
        tracing::debug!(digits, "dtmf requested on web session; nothing to press");
        Ok(())
    }
}
