//! Per-call voice session engine
//!
//! Owns one live call end to end: audio-frame ingress, voice-activity and
//! endpointing decisions, the STT→LLM→TTS pipeline with its tool loop, the
//! interruption protocol, recording, and cost accounting. All state
//! transitions for a session happen on a single actor task, so at most one
//! handler is ever in flight per call.

pub mod recording;
pub mod registry;
pub mod session;
pub mod sink;
pub mod turn;
pub mod vad;

pub use recording::RecordingWriter;
pub use registry::SessionRegistry;
pub use session::{Session, SessionConfig, SessionDeps, SessionHandle, SessionInfo};
pub use sink::{CallControl, MediaSink, NoopCallControl};
pub use turn::TurnState;
pub use vad::VoiceActivityDetector;

/// End reasons attached to `call.ended` and the call row.
pub mod end_reason {
    pub const CLIENT_REQUEST: &str = "client-request";
    pub const CLIENT_DISCONNECT: &str = "client-disconnect";
    pub const ASSISTANT_ENDED: &str = "assistant-ended";
    pub const MAX_DURATION: &str = "max-duration";
    pub const API_REQUEST: &str = "api-request";
    pub const SERVER_SHUTDOWN: &str = "server-shutdown";
}
