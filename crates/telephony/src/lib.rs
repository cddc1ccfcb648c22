//! Carrier control-plane adapters
//!
//! The engine is not a call-control tower: per carrier this crate only
//! translates webhooks into session lifecycle operations, answers with the
//! carrier-native media-bridge directive, and issues outbound/transfer/
//! hangup commands over the carrier's REST API. Media itself flows over the
//! engine's own WebSocket.

pub mod twilio;

pub use twilio::{TwilioCallControl, TwilioClient, TwilioInbound, TwilioStatus};

use thiserror::Error;

/// Carrier adapter failures.
#[derive(Error, Debug)]
pub enum TelephonyError {
    #[error("carrier returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("carrier network error: {0}")]
    Network(String),

    #[error("invalid carrier response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TelephonyError {
    fn from(err: reqwest::Error) -> Self {
        TelephonyError::Network(err.to_string())
    }
}

impl From<TelephonyError> for voice_engine_core::EngineError {
    fn from(err: TelephonyError) -> Self {
        voice_engine_core::EngineError::Provider(err.to_string())
    }
}
