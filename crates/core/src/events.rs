//! WebSocket event protocol
//!
//! Server-to-client events travel as `{type, data, timestamp}` JSON text
//! frames; client-to-server control messages are `{type, ...}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::call::CostBreakdown;

/// Server-to-client event.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Test,
    CallStarted {
        call_id: String,
        assistant_id: String,
        assistant_name: String,
    },
    CallEnded {
        reason: String,
        duration_secs: u64,
        cost: CostBreakdown,
    },
    SpeechStarted,
    SpeechEnded,
    TranscriptPartial {
        text: String,
    },
    TranscriptFinal {
        text: String,
    },
    AssistantThinking,
    AssistantMessage {
        text: String,
    },
    AssistantSpeaking,
    AssistantAudioDone,
    AssistantInterrupted {
        clear_audio: bool,
        reason: String,
    },
    ToolCalled {
        name: String,
        arguments: Value,
    },
    ToolResult {
        name: String,
        result: Value,
    },
    TransferStarted {
        destination: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    /// Wire `type` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Test => "test",
            ServerEvent::CallStarted { .. } => "call.started",
            ServerEvent::CallEnded { .. } => "call.ended",
            ServerEvent::SpeechStarted => "speech.started",
            ServerEvent::SpeechEnded => "speech.ended",
            ServerEvent::TranscriptPartial { .. } => "transcript.partial",
            ServerEvent::TranscriptFinal { .. } => "transcript.final",
            ServerEvent::AssistantThinking => "assistant.thinking",
            ServerEvent::AssistantMessage { .. } => "assistant.message",
            ServerEvent::AssistantSpeaking => "assistant.speaking",
            ServerEvent::AssistantAudioDone => "assistant.audio.done",
            ServerEvent::AssistantInterrupted { .. } => "assistant.interrupted",
            ServerEvent::ToolCalled { .. } => "tool.called",
            ServerEvent::ToolResult { .. } => "tool.result",
            ServerEvent::TransferStarted { .. } => "transfer.started",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Event payload for the wire `data` field.
    pub fn data(&self) -> Value {
        match self {
            ServerEvent::Test
            | ServerEvent::SpeechStarted
            | ServerEvent::SpeechEnded
            | ServerEvent::AssistantThinking
            | ServerEvent::AssistantSpeaking
            | ServerEvent::AssistantAudioDone => json!({}),
            ServerEvent::CallStarted {
                call_id,
                assistant_id,
                assistant_name,
            } => json!({
                "callId": call_id,
                "assistant": { "id": assistant_id, "name": assistant_name },
            }),
            ServerEvent::CallEnded {
                reason,
                duration_secs,
                cost,
            } => json!({
                "reason": reason,
                "duration": duration_secs,
                "costs": {
                    "stt": cost.stt_cents,
                    "llm": cost.llm_cents,
                    "tts": cost.tts_cents,
                    "total": cost.total_cents,
                },
            }),
            ServerEvent::TranscriptPartial { text } | ServerEvent::TranscriptFinal { text } => {
                json!({ "text": text })
            }
            ServerEvent::AssistantMessage { text } => json!({ "text": text }),
            ServerEvent::AssistantInterrupted { clear_audio, reason } => {
                json!({ "clearAudio": clear_audio, "reason": reason })
            }
            ServerEvent::ToolCalled { name, arguments } => {
                json!({ "name": name, "arguments": arguments })
            }
            ServerEvent::ToolResult { name, result } => {
                json!({ "name": name, "result": result })
            }
            ServerEvent::TransferStarted { destination } => {
                json!({ "destination": destination })
            }
            ServerEvent::Error { code, message } => {
                json!({ "code": code, "message": message })
            }
        }
    }

    /// Serialize to the `{type, data, timestamp}` wire shape.
    pub fn to_wire(&self, timestamp_ms: i64) -> Value {
        json!({
            "type": self.kind(),
            "data": self.data(),
            "timestamp": timestamp_ms,
        })
    }
}

/// Client-to-server control message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Hang up from the client side.
    End,
    /// Explicit barge-in request.
    Interrupt,
    /// Reserved; accepted and ignored.
    Config {
        #[serde(flatten)]
        options: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_has_type_data_timestamp() {
        let wire = ServerEvent::TranscriptFinal {
            text: "what time is it".into(),
        }
        .to_wire(1234);
        assert_eq!(wire["type"], "transcript.final");
        assert_eq!(wire["data"]["text"], "what time is it");
        assert_eq!(wire["timestamp"], 1234);
    }

    #[test]
    fn interrupted_event_instructs_flush() {
        let wire = ServerEvent::AssistantInterrupted {
            clear_audio: true,
            reason: "user-speech".into(),
        }
        .to_wire(0);
        assert_eq!(wire["data"]["clearAudio"], true);
    }

    #[test]
    fn client_commands_parse() {
        let end: ClientCommand = serde_json::from_str(r#"{"type":"end"}"#).unwrap();
        assert_eq!(end, ClientCommand::End);
        let cfg: ClientCommand =
            serde_json::from_str(r#"{"type":"config","echo":true}"#).unwrap();
        assert!(matches!(cfg, ClientCommand::Config { .. }));
    }

    #[test]
    fn call_ended_exposes_cost_fields() {
        let wire = ServerEvent::CallEnded {
            reason: "assistant-ended".into(),
            duration_secs: 61,
            cost: CostBreakdown {
                stt_cents: 1,
                llm_cents: 2,
                tts_cents: 2,
                total_cents: 5,
            },
        }
        .to_wire(0);
        assert_eq!(wire["data"]["costs"]["total"], 5);
        assert_eq!(wire["data"]["duration"], 61);
    }
}
