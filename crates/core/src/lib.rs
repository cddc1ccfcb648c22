//! Core types for the voice engine
//!
//! This crate provides foundational types used across all other crates:
//! - Call and call-message records
//! - Assistant and tool configuration
//! - The WebSocket event protocol
//! - PCM audio helpers
//! - The engine error taxonomy

pub mod assistant;
pub mod audio;
pub mod call;
pub mod cost;
pub mod error;
pub mod events;
pub mod message;
pub mod tool;

pub use assistant::{Assistant, FirstMessageMode, ModelConfig, TranscriberConfig, VoiceConfig};
pub use call::{Call, CallKind, CallStatus, CostBreakdown};
pub use error::{EngineError, Result};
pub use events::{ClientCommand, ServerEvent};
pub use message::{CallMessage, ChatMessage, ChatRole, ToolCall, TurnLatency};
pub use tool::{ToolConfig, ToolDefinition, ToolKind, TransferMode};

/// Ingress PCM sample rate (client/carrier microphone leg), Hz.
pub const INGRESS_SAMPLE_RATE: u32 = 16_000;

/// Egress PCM sample rate for web and widget sessions, Hz.
pub const EGRESS_SAMPLE_RATE_WEB: u32 = 24_000;

/// Egress PCM sample rate for telephony sessions, Hz.
pub const EGRESS_SAMPLE_RATE_TELEPHONY: u32 = 16_000;
